//! Interrupt handling
//!
//! Installing the Ctrl-C listener replaces the default handler, so the
//! process no longer dies on SIGINT; the driver observes the signal and
//! unwinds through its cleanup instead.

use tokio::sync::watch;
use tracing::{debug, warn};

/// Receiver side of an interrupt signal
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Sender side, used by the signal listener and by tests
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    /// Listen for Ctrl-C on the current runtime
    pub fn listen() -> Self {
        let (trigger, shutdown) = Self::manual();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Interrupt received, finishing cleanup");
                    trigger.trigger();
                }
                Err(e) => debug!("Ctrl-C listener unavailable: {}", e),
            }
        });
        shutdown
    }

    /// A signal fired only through the returned trigger
    pub fn manual() -> (ShutdownTrigger, Self) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Self { rx })
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal fires; pends forever if it never can
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
