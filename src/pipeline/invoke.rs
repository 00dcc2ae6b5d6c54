//! Analyzer invocation
//!
//! Runs the external analyzer on a plain chart with its stdout connected
//! through an OS pipe to the compressor's stdin. Neither stream passes
//! through this process, so output size never affects our memory use.

use crate::error::{SimcacheError, SimcacheResult};
use async_trait::async_trait;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::debug;

/// Lines of stderr kept in error reports
const STDERR_TAIL_LINES: usize = 8;

/// Characters of stderr kept in error reports
const STDERR_TAIL_CHARS: usize = 2048;

/// Produces a compressed artifact for one plain chart
///
/// Implementations write to `output` only; the caller decides when the
/// result becomes visible in the cache.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze `plain` and write the compressed result to `output`
    async fn produce(&self, plain: &Path, output: &Path) -> SimcacheResult<()>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Compressor command-line settings, passed through untouched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressorSettings {
    pub program: PathBuf,
    pub level: i32,
    /// 0 lets the compressor use every core
    pub threads: u32,
}

impl CompressorSettings {
    /// Arguments for compressing stdin into `output`
    pub fn args(&self, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(7);
        if self.level > 19 {
            args.push("--ultra".into());
        }
        args.push(format!("-{}", self.level).into());
        args.push(format!("-T{}", self.threads).into());
        args.push("-q".into());
        args.push("-f".into());
        args.push("-o".into());
        args.push(output.as_os_str().to_owned());
        args
    }
}

/// External analyzer piped into an external compressor
#[derive(Debug, Clone)]
pub struct ProcessAnalyzer {
    program: PathBuf,
    args: Vec<String>,
    compressor: CompressorSettings,
}

impl ProcessAnalyzer {
    /// Resolve both programs, failing if either is missing or not executable
    pub fn resolve(
        program: &Path,
        args: Vec<String>,
        compressor: CompressorSettings,
    ) -> SimcacheResult<Self> {
        let resolved = resolve_program(program).ok_or_else(|| SimcacheError::ToolNotFound {
            name: "analyzer".to_string(),
            program: program.to_path_buf(),
        })?;
        let compressor_program =
            resolve_program(&compressor.program).ok_or_else(|| SimcacheError::ToolNotFound {
                name: "compressor".to_string(),
                program: compressor.program.clone(),
            })?;

        debug!(
            "Analyzer: {}, compressor: {}",
            resolved.display(),
            compressor_program.display()
        );

        Ok(Self {
            program: resolved,
            args,
            compressor: CompressorSettings {
                program: compressor_program,
                ..compressor
            },
        })
    }

}

#[async_trait]
impl Analyzer for ProcessAnalyzer {
    async fn produce(&self, plain: &Path, output: &Path) -> SimcacheResult<()> {
        debug!(
            "Running {} {:?} {} | {} -> {}",
            self.program.display(),
            self.args,
            plain.display(),
            self.compressor.program.display(),
            output.display()
        );

        let mut analyzer = Command::new(&self.program)
            .args(&self.args)
            .arg(plain)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SimcacheError::AnalyzerSpawn {
                program: self.program.clone(),
                source: e,
            })?;

        let pipe: Stdio = analyzer
            .stdout
            .take()
            .ok_or_else(|| {
                SimcacheError::io("capturing analyzer stdout", std::io::ErrorKind::BrokenPipe.into())
            })?
            .try_into()
            .map_err(|e| SimcacheError::io("connecting analyzer to compressor", e))?;

        let compressor = Command::new(&self.compressor.program)
            .args(self.compressor.args(output))
            .stdin(pipe)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SimcacheError::CompressorSpawn {
                program: self.compressor.program.clone(),
                source: e,
            })?;

        let (analyzer_out, compressor_out) =
            tokio::join!(analyzer.wait_with_output(), compressor.wait_with_output());
        let analyzer_out =
            analyzer_out.map_err(|e| SimcacheError::io("waiting for analyzer", e))?;
        let compressor_out =
            compressor_out.map_err(|e| SimcacheError::io("waiting for compressor", e))?;

        check_exit(&analyzer_out, &compressor_out)
    }

    fn describe(&self) -> String {
        format!(
            "{} | {} -{}",
            self.program.display(),
            self.compressor.program.display(),
            self.compressor.level
        )
    }
}

/// Attribute a failure to the stage that caused it
///
/// A compressor that dies first leaves the analyzer killed by SIGPIPE;
/// that is reported as a compression failure.
fn check_exit(analyzer: &Output, compressor: &Output) -> SimcacheResult<()> {
    let analyzer_ok = analyzer.status.success();
    let compressor_ok = compressor.status.success();
    let analyzer_signaled = analyzer.status.code().is_none();

    if analyzer_ok && compressor_ok {
        return Ok(());
    }

    if !analyzer_ok && !(analyzer_signaled && !compressor_ok) {
        return Err(SimcacheError::Analyzer {
            exit_code: analyzer.status.code(),
            stderr_tail: stderr_tail(&analyzer.stderr),
        });
    }

    Err(SimcacheError::Compression {
        exit_code: compressor.status.code(),
        stderr_tail: stderr_tail(&compressor.stderr),
    })
}

/// Last few non-empty lines of a process's stderr
pub(crate) fn stderr_tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join("\n");

    let count = tail.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return tail;
    }
    tail.chars().skip(count - STDERR_TAIL_CHARS).collect()
}

/// Locate an executable, searching PATH for bare names
pub fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.is_absolute() || program.components().count() > 1 {
        return is_executable(program).then(|| program.to_path_buf());
    }

    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var).find_map(|dir| {
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        let with_suffix = dir.join(format!(
            "{}{}",
            program.display(),
            env::consts::EXE_SUFFIX
        ));
        is_executable(&with_suffix).then_some(with_suffix)
    })
}

fn is_executable(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[test]
    fn compressor_args() {
        let settings = CompressorSettings {
            program: PathBuf::from("zstd"),
            level: 19,
            threads: 0,
        };
        let args = settings.args(Path::new("/c/ab/x.json.zst"));
        assert_eq!(
            args,
            vec!["-19", "-T0", "-q", "-f", "-o", "/c/ab/x.json.zst"]
                .into_iter()
                .map(OsString::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn compressor_args_ultra() {
        let settings = CompressorSettings {
            program: PathBuf::from("zstd"),
            level: 22,
            threads: 4,
        };
        let args = settings.args(Path::new("out"));
        assert_eq!(args[0], OsString::from("--ultra"));
        assert_eq!(args[1], OsString::from("-22"));
        assert_eq!(args[2], OsString::from("-T4"));
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let stderr: String = (1..=20).map(|i| format!("line {}\n\n", i)).collect();
        let tail = stderr_tail(stderr.as_bytes());
        assert!(tail.starts_with("line 13"));
        assert!(tail.ends_with("line 20"));
        assert_eq!(tail.lines().count(), STDERR_TAIL_LINES);
    }

    #[test]
    fn stderr_tail_caps_length() {
        let long = "x".repeat(STDERR_TAIL_CHARS * 3);
        assert_eq!(stderr_tail(long.as_bytes()).len(), STDERR_TAIL_CHARS);
        assert_eq!(stderr_tail(b""), "");
    }

    #[test]
    fn resolve_missing_program() {
        assert!(resolve_program(Path::new("/definitely/not/here")).is_none());
        assert!(resolve_program(Path::new("simcache-no-such-tool-xyz")).is_none());
    }

    #[cfg(unix)]
    pub(crate) mod unix {
        use super::super::*;
        use serial_test::serial;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Compressor stand-in: copies stdin to the `-o` path
        pub(crate) const FAKE_COMPRESSOR: &str = r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
cat > "$out""#;

        /// Analyzer stand-in: prints a JSON line naming its input
        pub(crate) const FAKE_ANALYZER: &str = r#"printf '{"file":"%s"}\n' "$1""#;

        pub(crate) fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn analyzer(dir: &Path, analyzer_body: &str, compressor_body: &str) -> ProcessAnalyzer {
            let program = script(dir, "analyzer.sh", analyzer_body);
            let compressor = script(dir, "compressor.sh", compressor_body);
            ProcessAnalyzer::resolve(
                &program,
                Vec::new(),
                CompressorSettings {
                    program: compressor,
                    level: 3,
                    threads: 0,
                },
            )
            .unwrap()
        }

        #[tokio::test]
        #[serial]
        async fn pipes_analyzer_into_compressor() {
            let dir = TempDir::new().unwrap();
            let analyzer = analyzer(dir.path(), FAKE_ANALYZER, FAKE_COMPRESSOR);
            let output = dir.path().join("out.json.zst");

            analyzer
                .produce(Path::new("/charts/song.sm"), &output)
                .await
                .unwrap();

            assert_eq!(
                fs::read_to_string(&output).unwrap(),
                "{\"file\":\"/charts/song.sm\"}\n"
            );
        }

        #[tokio::test]
        #[serial]
        async fn extra_args_precede_path() {
            let dir = TempDir::new().unwrap();
            let program = script(dir.path(), "analyzer.sh", r#"echo "$@""#);
            let compressor = script(dir.path(), "compressor.sh", FAKE_COMPRESSOR);
            let analyzer = ProcessAnalyzer::resolve(
                &program,
                vec!["--format".to_string(), "json".to_string()],
                CompressorSettings {
                    program: compressor,
                    level: 3,
                    threads: 0,
                },
            )
            .unwrap();
            let output = dir.path().join("out");

            analyzer.produce(Path::new("a.sm"), &output).await.unwrap();
            assert_eq!(fs::read_to_string(&output).unwrap(), "--format json a.sm\n");
        }

        #[tokio::test]
        #[serial]
        async fn streams_large_output() {
            let dir = TempDir::new().unwrap();
            let analyzer = analyzer(
                dir.path(),
                "i=0; while [ $i -lt 20000 ]; do echo \"row $i padding padding padding\"; i=$((i+1)); done",
                FAKE_COMPRESSOR,
            );
            let output = dir.path().join("big");

            analyzer.produce(Path::new("x.sm"), &output).await.unwrap();
            let text = fs::read_to_string(&output).unwrap();
            assert_eq!(text.lines().count(), 20000);
        }

        #[tokio::test]
        #[serial]
        async fn analyzer_failure_reports_exit_and_stderr() {
            let dir = TempDir::new().unwrap();
            let analyzer = analyzer(
                dir.path(),
                "echo 'parse error at line 4' >&2; exit 3",
                FAKE_COMPRESSOR,
            );

            let err = analyzer
                .produce(Path::new("x.sm"), &dir.path().join("out"))
                .await
                .unwrap_err();

            match err {
                SimcacheError::Analyzer {
                    exit_code,
                    stderr_tail,
                } => {
                    assert_eq!(exit_code, Some(3));
                    assert!(stderr_tail.contains("parse error at line 4"));
                }
                other => panic!("expected analyzer error, got {:?}", other),
            }
        }

        #[tokio::test]
        #[serial]
        async fn compressor_failure_is_reported() {
            let dir = TempDir::new().unwrap();
            let analyzer = analyzer(
                dir.path(),
                FAKE_ANALYZER,
                "cat > /dev/null; echo 'disk full' >&2; exit 2",
            );

            let err = analyzer
                .produce(Path::new("x.sm"), &dir.path().join("out"))
                .await
                .unwrap_err();

            match err {
                SimcacheError::Compression {
                    exit_code,
                    stderr_tail,
                } => {
                    assert_eq!(exit_code, Some(2));
                    assert_eq!(stderr_tail, "disk full");
                }
                other => panic!("expected compression error, got {:?}", other),
            }
        }

        #[test]
        #[serial]
        fn resolve_rejects_non_executable() {
            let dir = TempDir::new().unwrap();
            let program = dir.path().join("analyzer");
            fs::write(&program, "#!/bin/sh\n").unwrap();
            fs::set_permissions(&program, fs::Permissions::from_mode(0o644)).unwrap();
            let compressor = script(dir.path(), "compressor.sh", FAKE_COMPRESSOR);

            let err = ProcessAnalyzer::resolve(
                &program,
                Vec::new(),
                CompressorSettings {
                    program: compressor,
                    level: 3,
                    threads: 0,
                },
            )
            .unwrap_err();
            assert!(err.is_precondition());
        }

        #[test]
        fn resolve_missing_compressor() {
            let err = ProcessAnalyzer::resolve(
                Path::new("/bin/sh"),
                Vec::new(),
                CompressorSettings {
                    program: PathBuf::from("simcache-no-such-compressor"),
                    level: 3,
                    threads: 0,
                },
            )
            .unwrap_err();
            assert!(matches!(err, SimcacheError::ToolNotFound { ref name, .. } if name == "compressor"));
        }

        #[tokio::test]
        #[serial]
        async fn real_zstd_round_trip() {
            let Some(zstd_bin) = resolve_program(Path::new("zstd")) else {
                return;
            };
            let dir = TempDir::new().unwrap();
            let program = script(dir.path(), "analyzer.sh", FAKE_ANALYZER);
            let analyzer = ProcessAnalyzer::resolve(
                &program,
                Vec::new(),
                CompressorSettings {
                    program: zstd_bin,
                    level: 19,
                    threads: 0,
                },
            )
            .unwrap();
            let output = dir.path().join("out.json.zst");

            analyzer.produce(Path::new("s.sm"), &output).await.unwrap();
            let decoded = zstd::decode_all(&fs::read(&output).unwrap()[..]).unwrap();
            assert_eq!(decoded, b"{\"file\":\"s.sm\"}\n");
        }
    }
}
