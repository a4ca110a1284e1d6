//! Integration tests for repro-fetch

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use repro_fetch::digest::Sha256Digest;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use url::Url;

    /// Isolated from the user's config and cache
    struct Env {
        dir: TempDir,
    }

    impl Env {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
            }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn cmd(&self) -> Command {
            self.cmd_for("none")
        }

        fn cmd_for(&self, distro: &str) -> Command {
            let mut cmd = cargo_bin_cmd!("repro-fetch");
            cmd.env_remove("REPRO_FETCH_CACHE")
                .arg("--config")
                .arg(self.path("config.toml"))
                .arg("--cache")
                .arg(self.path("cache"))
                .arg("--distro")
                .arg(distro);
            cmd
        }

        /// Serve `files` from a local mirror directory, returning its provider template
        fn mirror(&self, files: &[(&str, &[u8])]) -> String {
            let root = self.path("mirror");
            for (name, body) in files {
                let path = root.join(name);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, body).unwrap();
            }
            let root = root.canonicalize().unwrap();
            format!("{}{{{{.Name}}}}", Url::from_directory_path(&root).unwrap())
        }

        fn manifest(&self, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
            let mut text = String::new();
            for (file, body) in entries {
                text.push_str(&format!("{}  {}\n", Sha256Digest::of_bytes(body), file));
            }
            let path = self.path(name);
            std::fs::write(&path, text).unwrap();
            path
        }
    }

    fn blob_path(cache: &Path, body: &[u8]) -> PathBuf {
        cache
            .join("blobs/sha256")
            .join(Sha256Digest::of_bytes(body).as_str())
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("repro-fetch")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("reproducible package fetcher"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("repro-fetch")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("repro-fetch"));
    }

    #[test]
    fn cache_path_creates_cache() {
        let env = Env::new();
        env.cmd()
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cache"));
        assert!(env.path("cache").join("blobs/sha256").is_dir());
    }

    #[test]
    fn config_path_and_show() {
        let env = Env::new();
        env.cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
        env.cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"));
    }

    #[test]
    fn config_init_writes_defaults() {
        let env = Env::new();
        env.cmd().args(["config", "init"]).assert().success();
        let written = std::fs::read_to_string(env.path("config.toml")).unwrap();
        assert!(written.contains("skip_installed = true"));
    }

    #[test]
    fn download_from_file_mirror() {
        let env = Env::new();
        let provider = env.mirror(&[("tools/a.txt", b"alpha"), ("tools/b.txt", b"beta")]);
        let manifest = env.manifest(
            "SHA256SUMS",
            &[("tools/b.txt", b"beta"), ("tools/a.txt", b"alpha")],
        );

        env.cmd()
            .args(["download", "--provider", &provider])
            .arg(&manifest)
            .assert()
            .success()
            .stdout(predicate::str::contains("tools/a.txt").and(predicate::str::contains("tools/b.txt")))
            .stderr(predicate::str::contains("(001/002) a.txt"));

        let cache = env.path("cache");
        assert_eq!(std::fs::read(blob_path(&cache, b"alpha")).unwrap(), b"alpha");
        assert_eq!(std::fs::read(blob_path(&cache, b"beta")).unwrap(), b"beta");

        // Second run is served from the cache
        std::fs::remove_dir_all(env.path("mirror")).unwrap();
        env.cmd()
            .args(["download", "--provider", &provider])
            .arg(&manifest)
            .assert()
            .success()
            .stderr(predicate::str::contains("cached"));
    }

    #[test]
    fn download_falls_back_to_second_provider() {
        let env = Env::new();
        let good = env.mirror(&[("a.txt", b"alpha")]);
        let manifest = env.manifest("SHA256SUMS", &[("a.txt", b"alpha")]);
        let missing = format!(
            "{}{{{{.Name}}}}",
            Url::from_directory_path(env.dir.path().canonicalize().unwrap().join("nowhere")).unwrap()
        );

        env.cmd()
            .args(["download", "--provider", &missing, "--provider", &good])
            .arg(&manifest)
            .assert()
            .success()
            .stdout(predicate::str::contains("a.txt"));
    }

    #[test]
    fn download_rejects_tampered_file() {
        let env = Env::new();
        let provider = env.mirror(&[("a.txt", b"tampered")]);
        let manifest = env.manifest("SHA256SUMS", &[("a.txt", b"alpha")]);

        env.cmd()
            .args(["download", "--provider", &provider])
            .arg(&manifest)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to download a.txt"))
            .stderr(predicate::str::contains("Digest mismatch"));

        let cache = env.path("cache");
        assert!(!blob_path(&cache, b"alpha").exists());
        assert!(!blob_path(&cache, b"tampered").exists());
    }

    #[test]
    fn later_manifest_overrides_earlier() {
        let env = Env::new();
        let provider = env.mirror(&[("a.txt", b"new")]);
        let old = env.manifest("old.sums", &[("a.txt", b"old")]);
        let new = env.manifest("new.sums", &[("a.txt", b"new")]);

        env.cmd()
            .args(["download", "--provider", &provider])
            .arg(&old)
            .arg(&new)
            .assert()
            .success();
        assert!(blob_path(&env.path("cache"), b"new").exists());
    }

    #[test]
    fn download_without_provider_fails() {
        let env = Env::new();
        let manifest = env.manifest("SHA256SUMS", &[("a.txt", b"alpha")]);

        env.cmd()
            .arg("download")
            .arg(&manifest)
            .assert()
            .failure()
            .stderr(predicate::str::contains("No provider configured"));
    }

    #[test]
    fn malformed_manifest_fails() {
        let env = Env::new();
        let path = env.path("SHA256SUMS");
        std::fs::write(&path, "not-a-digest-line\n").unwrap();

        env.cmd()
            .args(["download", "--provider", "https://example.invalid/{{.Name}}"])
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("line 1"));
    }

    #[test]
    fn cache_ls_and_blob() {
        let env = Env::new();
        let provider = env.mirror(&[("a.txt", b"alpha")]);
        let manifest = env.manifest("SHA256SUMS", &[("a.txt", b"alpha")]);
        env.cmd()
            .args(["download", "--provider", &provider])
            .arg(&manifest)
            .assert()
            .success();

        let digest = Sha256Digest::of_bytes(b"alpha").to_string();
        env.cmd()
            .args(["cache", "ls", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains(digest.as_str()));
        env.cmd()
            .args(["cache", "blob", &digest])
            .assert()
            .success()
            .stdout(predicate::str::contains(digest.as_str()));
        env.cmd()
            .args(["cache", "blob", &Sha256Digest::of_bytes(b"other").to_string()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn null_driver_cannot_generate_hashes() {
        let env = Env::new();
        env.cmd()
            .args(["hash", "generate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("does not implement"));
    }

    #[test]
    fn unknown_distro_fails() {
        let env = Env::new();
        env.cmd_for("gentoo")
            .args(["cache", "path"])
            .assert()
            .success();
        env.cmd_for("gentoo")
            .args(["hash", "generate"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown distro driver"));
    }
}
