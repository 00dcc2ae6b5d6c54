//! Integration tests for simcache

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use std::path::Path;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "SIMCACHE_CONFIG",
    "SIMCACHE_INPUT_ROOT",
    "SIMCACHE_CACHE_ROOT",
    "SIMCACHE_ANALYZER",
    "SIMCACHE_COMPRESSOR",
    "SIMCACHE_ZSTD_LEVEL",
    "SIMCACHE_ZSTD_THREADS",
    "SIMCACHE_FORCE",
    "RUST_LOG",
];

/// Command isolated from user config and SIMCACHE_* overrides
fn simcache(workspace: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("simcache");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.current_dir(workspace)
        .arg("--no-local")
        .arg("--config")
        .arg(workspace.join("config.toml"));
    cmd
}

mod cli_tests {
    use super::*;
    use predicates::prelude::*;

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        simcache(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("content-addressed"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        simcache(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("simcache"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        simcache(temp.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        simcache(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[compression]"));
    }

    #[test]
    fn config_init_creates_file() {
        let temp = TempDir::new().unwrap();
        simcache(temp.path())
            .args(["config", "init"])
            .assert()
            .success();
        assert!(temp.path().join("config.toml").exists());
    }

    #[test]
    fn invalid_config_is_reported() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[compression]\nlevel = \"max\"\n")
            .unwrap();
        simcache(temp.path())
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn build_without_analyzer_fails() {
        let temp = TempDir::new().unwrap();
        simcache(temp.path())
            .arg("build")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No analyzer configured"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn build_rejects_unknown_mode() {
        let temp = TempDir::new().unwrap();
        simcache(temp.path())
            .args(["build", "rebuild"])
            .assert()
            .failure();
    }

    #[test]
    fn check_missing_input_root_fails() {
        let temp = TempDir::new().unwrap();
        simcache(temp.path())
            .args(["check", "--input-root", "absent"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Input root not found"));
    }

    #[test]
    fn check_reports_missing_and_ok() {
        let temp = TempDir::new().unwrap();
        let packs = temp.path().join("packs").join("Pack").join("Song");
        std::fs::create_dir_all(&packs).unwrap();
        std::fs::write(packs.join("song.sm"), b"#TITLE:Song;").unwrap();
        std::fs::write(packs.join("other.ssc"), b"#TITLE:Other;").unwrap();

        let cache = temp.path().join("cache");
        let id = simcache::cache::ContentId::of_bytes(b"#TITLE:Song;");
        let slot = simcache::cache::CacheLayout::new(&cache, "json.zst").slot_for(&id);
        slot.ensure_parent().unwrap();
        std::fs::write(slot.path(), zstd::encode_all(&b"{}"[..], 3).unwrap()).unwrap();

        simcache(temp.path())
            .args(["check", "--input-root", "packs", "--cache-root", "cache"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("song.sm ... ok"))
            .stdout(predicate::str::contains("other.ssc ... MISSING"))
            .stdout(predicate::str::contains("1 passed; 1 failed"));

        simcache(temp.path())
            .args([
                "check",
                "song.sm",
                "--input-root",
                "packs",
                "--cache-root",
                "cache",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("other.ssc").not());
    }

    #[test]
    fn check_list_prints_names_only() {
        let temp = TempDir::new().unwrap();
        let packs = temp.path().join("packs");
        std::fs::create_dir_all(&packs).unwrap();
        std::fs::write(packs.join("a.sm"), b"a").unwrap();
        std::fs::write(packs.join("b.sm"), b"b").unwrap();

        simcache(temp.path())
            .args(["check", "--list", "--skip", "b.sm", "--input-root", "packs"])
            .assert()
            .success()
            .stdout("a.sm\n");
    }

    #[test]
    fn locate_prints_slot() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("empty.sm"), b"").unwrap();

        simcache(temp.path())
            .args(["locate", "empty.sm", "--cache-root", "cache", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("d41d8cd98f00b204e9800998ecf8427e"))
            .stdout(predicate::str::contains("\"present\": false"));
    }

    #[test]
    fn check_finds_nested_baseline_tree() {
        let temp = TempDir::new().unwrap();
        let packs = temp.path().join("packs");
        std::fs::create_dir_all(&packs).unwrap();
        std::fs::write(packs.join("song.sm"), b"#TITLE:Nested;").unwrap();

        let nested = temp.path().join("cache").join("baseline");
        let id = simcache::cache::ContentId::of_bytes(b"#TITLE:Nested;");
        let slot = simcache::cache::CacheLayout::new(&nested, "json.zst").slot_for(&id);
        slot.ensure_parent().unwrap();
        std::fs::write(slot.path(), zstd::encode_all(&b"{}"[..], 3).unwrap()).unwrap();

        simcache(temp.path())
            .args(["check", "--input-root", "packs", "--cache-root", "cache"])
            .assert()
            .success()
            .stdout(predicate::str::contains("song.sm ... ok"));
    }

    #[test]
    fn status_reports_stale_partials() {
        let temp = TempDir::new().unwrap();
        let shard = temp.path().join("cache").join("ab");
        std::fs::create_dir_all(&shard).unwrap();
        std::fs::write(shard.join(".k3Jd9a.partial"), b"half").unwrap();

        simcache(temp.path())
            .args(["status", "--cache-root", "cache"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1 stale partial files"));
    }

    #[test]
    fn status_runs() {
        let temp = TempDir::new().unwrap();
        simcache(temp.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Analyzer:"));
    }
}

#[cfg(unix)]
mod build_tests {
    use super::*;
    use predicates::prelude::*;
    use serial_test::serial;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    const FAKE_COMPRESSOR: &str = r#"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
cat > "$out"
"#;

    const FAKE_ANALYZER: &str = r#"printf '{"file":"%s"}\n' "$1""#;

    const FAILING_ANALYZER: &str = "echo 'parse error' >&2\nexit 3";

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    struct Workspace {
        temp: TempDir,
        analyzer: PathBuf,
        compressor: PathBuf,
    }

    impl Workspace {
        fn new(analyzer_body: &str) -> Self {
            let temp = TempDir::new().unwrap();
            let bin = temp.path().join("bin");
            fs::create_dir_all(&bin).unwrap();
            let analyzer = script(&bin, "analyze", analyzer_body);
            let compressor = script(&bin, "zstd", FAKE_COMPRESSOR);

            let packs = temp.path().join("packs").join("Pack");
            fs::create_dir_all(&packs).unwrap();
            fs::write(packs.join("one.sm"), b"#TITLE:One;").unwrap();
            fs::write(packs.join("two.ssc"), b"#TITLE:Two;").unwrap();
            fs::write(
                packs.join("three.sm.zst"),
                zstd::encode_all(&b"#TITLE:Three;"[..], 3).unwrap(),
            )
            .unwrap();

            Self {
                temp,
                analyzer,
                compressor,
            }
        }

        fn build(&self) -> Command {
            let mut cmd = simcache(self.temp.path());
            cmd.arg("build")
                .arg("--input-root")
                .arg("packs")
                .arg("--cache-root")
                .arg("cache")
                .arg("--analyzer")
                .arg(&self.analyzer)
                .arg("--compressor")
                .arg(&self.compressor);
            cmd
        }

        fn artifact_count(&self) -> usize {
            walkdir::WalkDir::new(self.temp.path().join("cache"))
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().ends_with(".json.zst"))
                .count()
        }
    }

    #[test]
    #[serial]
    fn build_generates_then_skips() {
        let ws = Workspace::new(FAKE_ANALYZER);

        ws.build()
            .assert()
            .success()
            .stdout(predicate::str::contains("generated:").count(3))
            .stdout(predicate::str::contains("skip:").not());
        assert_eq!(ws.artifact_count(), 3);

        // The decoded sibling of three.sm.zst is transient
        assert!(!ws.temp.path().join("packs/Pack/three.sm").exists());

        ws.build()
            .assert()
            .success()
            .stdout(predicate::str::contains("skip:").count(3))
            .stdout(predicate::str::contains("generated:").not());
    }

    #[test]
    #[serial]
    fn build_force_regenerates() {
        let ws = Workspace::new(FAKE_ANALYZER);
        ws.build().assert().success();

        ws.build()
            .arg("force")
            .assert()
            .success()
            .stdout(predicate::str::contains("generated:").count(3));
    }

    #[test]
    #[serial]
    fn artifact_content_comes_from_analyzer() {
        let ws = Workspace::new(FAKE_ANALYZER);
        ws.build().assert().success();

        let id = simcache::cache::ContentId::of_bytes(b"#TITLE:One;");
        let slot = simcache::cache::CacheLayout::new(ws.temp.path().join("cache"), "json.zst")
            .slot_for(&id);
        let content = fs::read_to_string(slot.path()).unwrap();
        assert!(content.contains("one.sm"));
    }

    #[test]
    #[serial]
    fn failing_items_do_not_fail_batch() {
        let ws = Workspace::new(FAILING_ANALYZER);

        ws.build()
            .assert()
            .success()
            .stdout(predicate::str::contains("fail:").count(3))
            .stdout(predicate::str::contains("parse error"));
        assert_eq!(ws.artifact_count(), 0);

        ws.build()
            .arg("--strict")
            .assert()
            .failure()
            .stderr(predicate::str::contains("3 item(s) failed"));
    }

    #[test]
    #[serial]
    fn missing_compressor_refuses_to_start() {
        let ws = Workspace::new(FAKE_ANALYZER);

        simcache(ws.temp.path())
            .args(["build", "--input-root", "packs", "--cache-root", "cache"])
            .arg("--analyzer")
            .arg(&ws.analyzer)
            .arg("--compressor")
            .arg(ws.temp.path().join("bin/no-such-zstd"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Required tool not found: compressor"))
            .code(2);
        assert!(!ws.temp.path().join("cache").exists());
    }

    #[test]
    #[serial]
    fn missing_input_root_refuses_to_start() {
        let ws = Workspace::new(FAKE_ANALYZER);

        simcache(ws.temp.path())
            .args(["build", "--input-root", "nowhere", "--cache-root", "cache"])
            .arg("--analyzer")
            .arg(&ws.analyzer)
            .arg("--compressor")
            .arg(&ws.compressor)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Input root not found"));
    }
}
