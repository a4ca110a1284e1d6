//! Debian-family driver (debian, ubuntu)
//!
//! - installed packages: `dpkg-query -W`
//! - package index: `apt-cache show`, one control paragraph per known
//!   version, each carrying its pool `Filename` and `SHA256`
//! - installation: `dpkg -i <blob paths>`

use crate::cache::Cache;
use crate::digest::Sha256Digest;
use crate::distro::exec::{display_command, CommandRunner, SystemRunner};
use crate::distro::generate::{write_latest, IndexRecord};
use crate::version;
use crate::distro::{resolve_blobs, script, DistroDriver, DistroInfo, HashOpts};
use crate::error::{ReproError, ReproResult};
use crate::filespec::{FileSpec, PackageFormat, PackageIdentity};
use crate::manifest::HashWriter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const NAME_DEBIAN: &str = "debian";
pub const NAME_UBUNTU: &str = "ubuntu";

const DPKG_QUERY_FORMAT: &str = "${Package},${Version},${Architecture}\n";

/// An installed dpkg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledDpkg {
    pub package: String,
    pub version: String,
    pub architecture: String,
}

impl InstalledDpkg {
    fn key(&self) -> String {
        if self.architecture.is_empty() {
            self.package.clone()
        } else {
            format!("{}:{}", self.package, self.architecture)
        }
    }
}

/// Debian-family driver
pub struct Debian {
    info: DistroInfo,
    runner: Arc<dyn CommandRunner>,
    /// Computed on first use, then read-only for this instance
    installed: OnceCell<HashMap<String, InstalledDpkg>>,
}

impl Debian {
    /// Driver for Debian
    pub fn new() -> Self {
        Self::with_runner(NAME_DEBIAN, Arc::new(SystemRunner))
    }

    /// Driver for Ubuntu
    pub fn ubuntu() -> Self {
        Self::with_runner(NAME_UBUNTU, Arc::new(SystemRunner))
    }

    /// Driver that runs package manager commands through `runner`
    pub fn with_runner(name: &'static str, runner: Arc<dyn CommandRunner>) -> Self {
        // HTTPS is not the default in the apt ecosystem; the digest check
        // carries the integrity guarantee.
        let default_providers = if name == NAME_UBUNTU {
            vec![
                "http://ports.ubuntu.com/{{.Name}}".to_string(),
                "http://archive.ubuntu.com/ubuntu/{{.Name}}".to_string(),
            ]
        } else {
            vec![
                "http://deb.debian.org/debian/{{.Name}}".to_string(),
                "http://deb.debian.org/debian-security/{{.Name}}".to_string(),
                "http://debian.notset.fr/snapshot/by-hash/SHA256/{{.SHA256}}".to_string(),
            ]
        };
        Self {
            info: DistroInfo {
                name: if name == NAME_UBUNTU {
                    NAME_UBUNTU
                } else {
                    NAME_DEBIAN
                },
                default_providers,
                experimental: false,
                cache_needed_for_hash: false,
                required_scheme: None,
            },
            runner,
            installed: OnceCell::new(),
        }
    }

    /// Installed packages keyed by `package:arch`
    pub async fn installed(&self) -> ReproResult<&HashMap<String, InstalledDpkg>> {
        self.installed
            .get_or_try_init(|| async {
                let args = vec![
                    "-W".to_string(),
                    "-f".to_string(),
                    DPKG_QUERY_FORMAT.to_string(),
                ];
                let out = self.runner.output("dpkg-query", &args).await?;
                let pkgs = parse_installed(&out)
                    .map_err(|reason| ReproError::command_exec("dpkg-query -W", reason))?;
                debug!("{} dpkgs installed", pkgs.len());
                Ok::<_, ReproError>(pkgs)
            })
            .await
    }

    fn identity<'a>(&self, spec: &'a FileSpec) -> ReproResult<&'a PackageIdentity> {
        spec.identity
            .as_ref()
            .filter(|id| id.format == PackageFormat::Dpkg)
            .ok_or_else(|| ReproError::MissingIdentity {
                kind: "dpkg",
                name: spec.name.clone(),
            })
    }
}

impl Default for Debian {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `package,version,architecture` lines
fn parse_installed(out: &str) -> Result<HashMap<String, InstalledDpkg>, String> {
    const EXPECTED_FIELDS: usize = 3;
    let mut pkgs = HashMap::new();
    for line in out.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let fields: Vec<&str> = trimmed.splitn(EXPECTED_FIELDS, ',').collect();
        if fields.len() != EXPECTED_FIELDS {
            return Err(format!(
                "unexpected line {:?}: expected {} fields, got {}",
                line,
                EXPECTED_FIELDS,
                fields.len()
            ));
        }
        let pkg = InstalledDpkg {
            package: fields[0].to_string(),
            version: fields[1].to_string(),
            architecture: fields[2].to_string(),
        };
        pkgs.insert(pkg.key(), pkg);
    }
    Ok(pkgs)
}

/// Reduce `apt-cache show` control paragraphs to index records.
/// Paragraphs without a usable `Filename` or `SHA256` are skipped.
fn parse_apt_cache_show(out: &str) -> Vec<IndexRecord> {
    let mut records = Vec::new();
    for paragraph in out.split("\n\n") {
        let mut fields: HashMap<&str, &str> = HashMap::new();
        for line in paragraph.lines() {
            // Continuation lines belong to multi-line fields such as Description
            if line.starts_with([' ', '\t']) {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                fields.insert(key.trim(), value.trim());
            }
        }
        let (Some(&package), Some(&version)) = (fields.get("Package"), fields.get("Version")) else {
            continue;
        };

        let Some(filename) = fields.get("Filename").filter(|f| !f.is_empty()) else {
            warn!("No Filename found for package {:?} (Hint: try 'apt-get update')", package);
            continue;
        };
        let Some(hex) = fields.get("SHA256").filter(|h| !h.is_empty()) else {
            warn!("No SHA256 found for package {:?} (Hint: try 'apt-get update')", package);
            continue;
        };
        let sha256 = match Sha256Digest::parse(hex) {
            Ok(d) => d,
            Err(e) => {
                warn!("Skipping {} {}: {}", package, version, e);
                continue;
            }
        };
        records.push(IndexRecord {
            package: package.to_string(),
            version: version.to_string(),
            architecture: fields
                .get("Architecture")
                .filter(|a| !a.is_empty())
                .map(|a| a.to_string()),
            filename: filename.to_string(),
            sha256,
        });
    }
    records
}

#[async_trait]
impl DistroDriver for Debian {
    fn info(&self) -> &DistroInfo {
        &self.info
    }

    async fn generate_hash(
        &self,
        hw: &mut dyn HashWriter,
        opts: &HashOpts<'_>,
        cancel: &CancellationToken,
    ) -> ReproResult<()> {
        let mut names = opts.filter_by_name.clone();
        if names.is_empty() {
            let installed = self.installed().await?;
            if installed.is_empty() {
                return Err(ReproError::NoInstalledPackages);
            }
            names = installed.keys().cloned().collect();
        }
        names.sort();
        if cancel.is_cancelled() {
            return Err(ReproError::Cancelled);
        }

        // Names without a candidate make apt-cache exit non-zero while
        // still printing the others
        let mut args = vec!["show".to_string()];
        args.extend(names);
        let out = self.runner.output_lenient("apt-cache", &args).await?;
        let records = parse_apt_cache_show(&out);
        debug!("Scanned {} index records", records.len());
        if records.is_empty() {
            return Err(ReproError::EmptyIndex(display_command("apt-cache", &args)));
        }
        let written = write_latest(records, version::compare, hw)?;
        info!("Generated {} hash entries", written);
        Ok(())
    }

    fn package_name(&self, spec: &FileSpec) -> ReproResult<String> {
        Ok(self.identity(spec)?.package.clone())
    }

    async fn is_package_version_installed(&self, spec: &FileSpec) -> ReproResult<bool> {
        let id = self.identity(spec)?;
        let installed = self.installed().await?;
        Ok(installed
            .get(&id.snapshot_key())
            .is_some_and(|inst| inst.version == id.version))
    }

    async fn install(
        &self,
        cache: &Cache,
        specs: &[FileSpec],
        cancel: &CancellationToken,
    ) -> ReproResult<()> {
        if specs.is_empty() {
            return Ok(());
        }
        let blobs = resolve_blobs(cache, specs).await?;
        let mut args = vec!["-i".to_string()];
        info!(
            "Running '{} ...' with {} packages",
            display_command("dpkg", &args),
            specs.len()
        );
        args.extend(blobs.iter().map(|(_, p)| p.to_string_lossy().into_owned()));
        self.runner.run_interactive("dpkg", &args, cancel).await
    }

    async fn generate_install_script(
        &self,
        cache: &Cache,
        specs: &[FileSpec],
    ) -> ReproResult<String> {
        let blobs = resolve_blobs(cache, specs).await?;
        let mut out = script::header(self.info.name, blobs.len());
        if !blobs.is_empty() {
            out.push_str(&script::command_with_paths(
                "dpkg",
                &["-i"],
                blobs.iter().map(|(_, p)| p.as_path()),
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distro::exec::testing::FakeRunner;
    use crate::manifest::HashManifest;
    use tempfile::TempDir;
    use url::Url;

    const DPKG_QUERY_OUT: &str = "\
hello,2.10-2,amd64
libc6,2.36-9,amd64
libc6,2.36-9,i386
";

    fn sha(c: char) -> String {
        c.to_string().repeat(64)
    }

    fn driver(runner: Arc<FakeRunner>) -> Debian {
        Debian::with_runner(NAME_DEBIAN, runner)
    }

    #[test]
    fn parse_installed_keys_by_arch() {
        let pkgs = parse_installed(DPKG_QUERY_OUT).unwrap();
        assert_eq!(pkgs.len(), 3);
        assert_eq!(pkgs["libc6:i386"].version, "2.36-9");
    }

    #[test]
    fn parse_installed_rejects_short_lines() {
        assert!(parse_installed("hello,2.10\n").is_err());
    }

    fn paragraph(package: &str, version: &str, arch: &str, fill: char) -> String {
        format!(
            "Package: {package}\n\
             Architecture: {arch}\n\
             Version: {version}\n\
             Filename: pool/main/{initial}/{package}/{package}_{version}_{arch}.deb\n\
             Size: 56132\n\
             MD5sum: 0123456789abcdef0123456789abcdef\n\
             SHA256: {sha256}\n\
             SHA512: {sha512}\n\
             Description: example package\n \
             Filename: not/a/field.deb\n\n",
            initial = &package[..1],
            sha256 = sha(fill),
            sha512 = "e".repeat(128),
        )
    }

    #[test]
    fn parse_apt_cache_show_paragraphs() {
        let out = format!(
            "{}{}Package: old\nVersion: 1\nArchitecture: all\nFilename: pool/main/o/old/old_1_all.deb\nMD5sum: abc\n",
            paragraph("hello", "2.10-2", "amd64", 'a'),
            paragraph("libgcc", "1:12.2", "amd64", 'b'),
        );
        let records = parse_apt_cache_show(&out);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].filename, "pool/main/h/hello/hello_2.10-2_amd64.deb");
        assert_eq!(records[0].package, "hello");
        assert_eq!(records[0].architecture.as_deref(), Some("amd64"));
        assert_eq!(records[0].sha256.as_str(), sha('a'));
        assert_eq!(records[1].version, "1:12.2");
    }

    #[tokio::test]
    async fn generate_hash_for_named_packages() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("apt-cache", &paragraph("hello", "2.10-2", "amd64", 'c'));
        let d = driver(runner.clone());
        let mut m = HashManifest::new();
        let opts = HashOpts {
            filter_by_name: vec!["hello".to_string()],
            cache: None,
        };
        d.generate_hash(&mut m, &opts, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(m.len(), 1);
        assert_eq!(runner.calls(), vec!["apt-cache show hello"]);
    }

    #[tokio::test]
    async fn generate_hash_reads_sha256_from_ubuntu_index() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond(
            "apt-cache",
            &paragraph("hello", "2.10-2ubuntu4", "amd64", 'a'),
        );
        let d = Debian::with_runner(NAME_UBUNTU, runner);
        let mut m = HashManifest::new();
        let opts = HashOpts {
            filter_by_name: vec!["hello".to_string()],
            cache: None,
        };
        d.generate_hash(&mut m, &opts, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            m.get("pool/main/h/hello/hello_2.10-2ubuntu4_amd64.deb")
                .map(|d| d.as_str()),
            Some(sha('a').as_str())
        );
    }

    #[tokio::test]
    async fn generate_hash_keeps_highest_version() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond(
            "apt-cache",
            &format!(
                "{}{}{}",
                paragraph("hello", "2.10-2", "amd64", 'a'),
                paragraph("hello", "2.10-3", "amd64", 'b'),
                paragraph("hello", "2.10-1", "amd64", 'c'),
            ),
        );
        let d = driver(runner);
        let mut m = HashManifest::new();
        let opts = HashOpts {
            filter_by_name: vec!["hello".to_string()],
            cache: None,
        };
        d.generate_hash(&mut m, &opts, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(m.len(), 1);
        assert!(m.get("pool/main/h/hello/hello_2.10-3_amd64.deb").is_some());
    }

    #[tokio::test]
    async fn generate_hash_tolerates_unknown_names() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond_failing("apt-cache", &paragraph("hello", "2.10-2", "amd64", 'a'));
        let d = driver(runner);
        let mut m = HashManifest::new();
        let opts = HashOpts {
            filter_by_name: vec!["hello".to_string(), "no-such-package".to_string()],
            cache: None,
        };
        d.generate_hash(&mut m, &opts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(m.len(), 1);
    }

    #[tokio::test]
    async fn generate_hash_fails_without_usable_records() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond(
            "apt-cache",
            "Package: hello\nVersion: 2.10-2\nFilename: pool/main/h/hello/hello_2.10-2_amd64.deb\nSHA512: abcd\n",
        );
        let d = driver(runner);
        let mut m = HashManifest::new();
        let opts = HashOpts {
            filter_by_name: vec!["hello".to_string()],
            cache: None,
        };
        let err = d
            .generate_hash(&mut m, &opts, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReproError::EmptyIndex(_)));
        assert!(m.is_empty());
    }

    #[tokio::test]
    async fn generate_hash_defaults_to_installed() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("dpkg-query", DPKG_QUERY_OUT);
        runner.respond("apt-cache", &paragraph("hello", "2.10-2", "amd64", 'a'));
        let d = driver(runner.clone());
        let mut m = HashManifest::new();
        d.generate_hash(&mut m, &HashOpts::default(), &CancellationToken::new())
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(
            calls.last().unwrap(),
            "apt-cache show hello:amd64 libc6:amd64 libc6:i386"
        );
    }

    #[tokio::test]
    async fn generate_hash_fails_when_nothing_installed() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("dpkg-query", "");
        let d = driver(runner);
        let mut m = HashManifest::new();
        let err = d
            .generate_hash(&mut m, &HashOpts::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReproError::NoInstalledPackages));
    }

    #[tokio::test]
    async fn installed_check_matches_exact_version() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("dpkg-query", DPKG_QUERY_OUT);
        let d = driver(runner.clone());
        let digest = Sha256Digest::parse(&sha('d')).unwrap();

        let same = FileSpec::new("pool/main/h/hello/hello_2.10-2_amd64.deb", digest.clone()).unwrap();
        let newer = FileSpec::new("pool/main/h/hello/hello_2.10-3_amd64.deb", digest.clone()).unwrap();
        let absent = FileSpec::new("pool/main/c/curl/curl_7.88_amd64.deb", digest).unwrap();

        assert!(d.is_package_version_installed(&same).await.unwrap());
        assert!(!d.is_package_version_installed(&newer).await.unwrap());
        assert!(!d.is_package_version_installed(&absent).await.unwrap());

        // Snapshot is computed once per instance
        let queries = runner
            .calls()
            .iter()
            .filter(|c| c.starts_with("dpkg-query"))
            .count();
        assert_eq!(queries, 1);
    }

    #[tokio::test]
    async fn installed_check_requires_identity() {
        let d = driver(Arc::new(FakeRunner::new()));
        let spec = FileSpec::new("tool.tar.gz", Sha256Digest::parse(&sha('e')).unwrap()).unwrap();
        let err = d.is_package_version_installed(&spec).await.unwrap_err();
        assert!(matches!(err, ReproError::MissingIdentity { .. }));
        assert!(d.package_name(&spec).is_err());
    }

    #[tokio::test]
    async fn install_requires_resident_blobs() {
        let dir = TempDir::new().unwrap();
        let cache = Cache::open(dir.path()).await.unwrap();
        let runner = Arc::new(FakeRunner::new());
        let d = driver(runner.clone());
        let spec = FileSpec::new(
            "pool/main/h/hello/hello_2.10-2_amd64.deb",
            Sha256Digest::parse(&sha('f')).unwrap(),
        )
        .unwrap();

        let err = d
            .install(&cache, &[spec], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReproError::BlobNotFound(_)));
        assert!(runner.calls().is_empty());

        d.install(&cache, &[], &CancellationToken::new())
            .await
            .unwrap();
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn install_passes_blob_paths_to_dpkg() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("hello.deb");
        std::fs::write(&src, b"deb").unwrap();
        let cache = Cache::open(dir.path().join("cache")).await.unwrap();
        let digest = Sha256Digest::of_bytes(b"deb");
        cache
            .ensure(
                &Url::from_file_path(&src).unwrap(),
                &digest,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let runner = Arc::new(FakeRunner::new());
        let d = driver(runner.clone());
        let spec = FileSpec::new("pool/main/h/hello/hello_2.10-2_amd64.deb", digest.clone()).unwrap();
        d.install(&cache, &[spec.clone()], &CancellationToken::new())
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("dpkg -i "));
        assert!(calls[0].ends_with(digest.as_str()));

        let script = d.generate_install_script(&cache, &[spec]).await.unwrap();
        assert!(script.starts_with("#!/bin/sh"));
        assert!(script.contains("dpkg -i"));
        assert!(script.contains(digest.as_str()));
    }

    #[test]
    fn ubuntu_has_its_own_providers() {
        let d = Debian::ubuntu();
        assert_eq!(d.info().name, "ubuntu");
        assert!(d.info().default_providers[0].contains("ubuntu.com"));
    }
}
