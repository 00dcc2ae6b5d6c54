//! Batch driver
//!
//! Each input moves through
//! `Discovered -> Identified -> {Skipped | Materializing -> Analyzing -> Stored | Failed}`.
//! Item failures are recorded and the batch continues. Artifacts are
//! written to a hidden partial file in the shard directory and renamed
//! onto the slot only once analysis and compression both succeed.

use crate::cache::{identity, CacheLayout, CacheSlot, PARTIAL_SUFFIX};
use crate::error::{SimcacheError, SimcacheResult};
use crate::input::InputRef;
use crate::pipeline::invoke::Analyzer;
use crate::pipeline::materialize::Materializer;
use crate::pipeline::shutdown::Shutdown;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Terminal state of one input
#[derive(Debug)]
pub enum ItemOutcome {
    /// Artifact already present
    Skipped { slot: PathBuf },
    /// Artifact written
    Stored { slot: PathBuf },
    Failed { error: SimcacheError },
}

/// Counts for a finished (or interrupted) batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub interrupted: bool,
}

impl BatchReport {
    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Skipped { .. } => self.skipped += 1,
            ItemOutcome::Stored { .. } => self.generated += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Items that reached a terminal state
    pub fn processed(&self) -> usize {
        self.generated + self.skipped + self.failed
    }
}

/// Sequential cache-building pipeline
pub struct Pipeline<'a> {
    layout: &'a CacheLayout,
    analyzer: &'a dyn Analyzer,
    materializer: Materializer,
    force: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        layout: &'a CacheLayout,
        analyzer: &'a dyn Analyzer,
        materializer: Materializer,
    ) -> Self {
        Self {
            layout,
            analyzer,
            materializer,
            force: false,
        }
    }

    /// Recompute artifacts even when their slot exists
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Process every input in order, calling `on_item` after each one
    ///
    /// Stops early only on interrupt. Every transient file owned by the
    /// run is released before this returns.
    pub async fn run<F>(
        mut self,
        inputs: &[InputRef],
        shutdown: &mut Shutdown,
        mut on_item: F,
    ) -> BatchReport
    where
        F: FnMut(&InputRef, &ItemOutcome),
    {
        let mut report = BatchReport::default();
        debug!(
            "Processing {} inputs (force: {}, materialize: {}, analyzer: {})",
            inputs.len(),
            self.force,
            self.materializer.mode(),
            self.analyzer.describe()
        );

        for input in inputs {
            if shutdown.is_triggered() {
                report.interrupted = true;
                break;
            }

            let outcome = match self.process(input, shutdown).await {
                Ok(outcome) => outcome,
                Err(SimcacheError::Interrupted) => {
                    warn!("Interrupted while processing {}", input.path.display());
                    report.interrupted = true;
                    break;
                }
                Err(error) => {
                    warn!("{}: {}", input.path.display(), error);
                    ItemOutcome::Failed { error }
                }
            };

            report.record(&outcome);
            on_item(input, &outcome);
        }

        self.materializer.release_all();
        report
    }

    async fn process(
        &mut self,
        input: &InputRef,
        shutdown: &mut Shutdown,
    ) -> SimcacheResult<ItemOutcome> {
        let id = identity(input)?;
        let slot = self.layout.slot_for(&id);
        debug!("{} identified as {}", input.path.display(), id);

        if slot.exists() && !self.force {
            debug!("Slot present: {}", slot.path().display());
            return Ok(ItemOutcome::Skipped {
                slot: slot.path().to_path_buf(),
            });
        }

        slot.ensure_parent()?;
        let plain = self.materializer.ensure_plain(input)?;
        debug!("Analyzing {}", plain.path.display());

        let result = self.store(&plain.path, &slot, shutdown).await;
        self.materializer.release_item(&plain);
        result?;

        info!("Stored {}", slot.path().display());
        Ok(ItemOutcome::Stored {
            slot: slot.path().to_path_buf(),
        })
    }

    /// Run the analyzer into a partial file and move it onto the slot
    ///
    /// The partial file is removed on every failure path, including
    /// interrupt, so the slot only ever holds complete artifacts.
    async fn store(
        &self,
        plain: &Path,
        slot: &CacheSlot,
        shutdown: &mut Shutdown,
    ) -> SimcacheResult<()> {
        let partial = tempfile::Builder::new()
            .prefix(".")
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(slot.parent())
            .map_err(|e| {
                SimcacheError::io(
                    format!("creating partial file in {}", slot.parent().display()),
                    e,
                )
            })?
            .into_temp_path();

        tokio::select! {
            result = self.analyzer.produce(plain, &partial) => result?,
            _ = shutdown.triggered() => return Err(SimcacheError::Interrupted),
        }

        // A compressed stream always carries a frame header
        let written = std::fs::metadata(&partial)
            .map_err(|e| SimcacheError::io(format!("reading {}", partial.display()), e))?
            .len();
        if written == 0 {
            return Err(SimcacheError::Compression {
                exit_code: Some(0),
                stderr_tail: "no output written".to_string(),
            });
        }

        partial.persist(slot.path()).map_err(|e| {
            SimcacheError::io(format!("moving artifact to {}", slot.path().display()), e.error)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o644);
            if let Err(e) = std::fs::set_permissions(slot.path(), perms) {
                warn!("Failed to set permissions on {}: {}", slot.path().display(), e);
            }
        }

        Ok(())
    }
}
