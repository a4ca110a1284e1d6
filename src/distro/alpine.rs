//! Alpine driver (experimental)
//!
//! apk indices carry SHA-1 checksums only, so hash generation downloads
//! each package into the cache once and names it by the computed SHA-256.
//! Re-runs reuse the cache's origin URL index instead of downloading again.

use crate::cache::Cache;
use crate::distro::exec::{display_command, CommandRunner, SystemRunner};
use crate::distro::generate::{write_latest, IndexRecord};
use crate::distro::{resolve_blobs, script, DistroDriver, DistroInfo, HashOpts};
use crate::error::{ReproError, ReproResult};
use crate::filespec::{redact, split_apk_name, FileSpec, PackageFormat, PackageIdentity};
use crate::manifest::HashWriter;
use crate::version;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

pub const NAME: &str = "alpine";

/// An installed apk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledApk {
    pub package: String,
    pub version: String,
}

/// Alpine driver
pub struct Alpine {
    info: DistroInfo,
    runner: Arc<dyn CommandRunner>,
    /// Computed on first use, then read-only for this instance
    installed: OnceCell<HashMap<String, InstalledApk>>,
}

impl Alpine {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(SystemRunner))
    }

    /// Driver that runs apk through `runner`
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            info: DistroInfo {
                name: NAME,
                default_providers: vec!["https://dl-cdn.alpinelinux.org/alpine/{{.Name}}".to_string()],
                experimental: true,
                cache_needed_for_hash: true,
                required_scheme: Some("https"),
            },
            runner,
            installed: OnceCell::new(),
        }
    }

    /// Installed packages keyed by name
    pub async fn installed(&self) -> ReproResult<&HashMap<String, InstalledApk>> {
        self.installed
            .get_or_try_init(|| async {
                let out = self
                    .runner
                    .output("apk", &["info".to_string(), "-v".to_string()])
                    .await?;
                let pkgs = parse_installed(&out)
                    .map_err(|reason| ReproError::command_exec("apk info -v", reason))?;
                debug!("{} apks installed", pkgs.len());
                Ok::<_, ReproError>(pkgs)
            })
            .await
    }

    fn identity<'a>(&self, spec: &'a FileSpec) -> ReproResult<&'a PackageIdentity> {
        spec.identity
            .as_ref()
            .filter(|id| id.format == PackageFormat::Apk)
            .ok_or_else(|| ReproError::MissingIdentity {
                kind: "apk",
                name: spec.name.clone(),
            })
    }

    /// Manifest entry for one package URL
    async fn record_for_url(
        &self,
        cache: &Cache,
        url: &Url,
        cancel: &CancellationToken,
    ) -> ReproResult<IndexRecord> {
        if url.scheme() != "https" {
            return Err(ReproError::UrlScheme {
                scheme: url.scheme().to_string(),
                url: redact(url),
                expected: "https".to_string(),
            });
        }
        let filename = filename_without_provider(url)?;
        let basename = filename.rsplit('/').next().unwrap_or(&filename).to_string();
        let id = PackageIdentity::from_apk_basename(&basename).ok_or_else(|| {
            ReproError::command_exec(
                "apk fetch",
                format!("cannot parse package name from {:?}", basename),
            )
        })?;

        let sha256 = match cache.sha256_by_origin_url(url).await {
            Ok(sha256) => {
                debug!("{:?}: found cached sha256 {} for {}", basename, sha256, redact(url));
                sha256
            }
            Err(e) if e.is_not_found() => {
                debug!("{:?}: downloading from {}", basename, redact(url));
                cache.import_with_url(url, cancel).await?
            }
            Err(e) => return Err(e),
        };

        // v3.16/main/x86_64/foo-1.0-r0.apk: the directory above the file is the arch
        let architecture = filename
            .rsplit('/')
            .nth(1)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(IndexRecord {
            package: id.package,
            version: id.version,
            architecture,
            filename,
            sha256,
        })
    }
}

impl Default for Alpine {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_installed(out: &str) -> Result<HashMap<String, InstalledApk>, String> {
    let mut pkgs = HashMap::new();
    for line in out.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (package, version) = split_apk_name(trimmed).ok_or_else(|| {
            format!(
                "failed to split {:?} into the package name and the version string",
                trimmed
            )
        })?;
        pkgs.insert(
            package.to_string(),
            InstalledApk {
                package: package.to_string(),
                version: version.to_string(),
            },
        );
    }
    Ok(pkgs)
}

/// `https://dl-cdn.alpinelinux.org/alpine/v3.16/main/x86_64/foo-1.0-r0.apk`
/// -> `v3.16/main/x86_64/foo-1.0-r0.apk`
fn filename_without_provider(url: &Url) -> ReproResult<String> {
    let segments: Vec<&str> = url.path().split('/').collect();
    for i in 1..segments.len() {
        let seg = segments[i].as_bytes();
        if segments[i - 1].starts_with("alpine")
            && seg.len() >= 2
            && seg[0] == b'v'
            && (b'1'..=b'9').contains(&seg[1])
        {
            return Ok(segments[i..].join("/"));
        }
    }
    Err(ReproError::InvalidUrl {
        url: redact(url),
        reason: "no alpine/v<release>/ component".to_string(),
    })
}

#[async_trait]
impl DistroDriver for Alpine {
    fn info(&self) -> &DistroInfo {
        &self.info
    }

    async fn generate_hash(
        &self,
        hw: &mut dyn HashWriter,
        opts: &HashOpts<'_>,
        cancel: &CancellationToken,
    ) -> ReproResult<()> {
        let cache = opts.cache.ok_or(ReproError::CacheRequired(NAME))?;
        let mut names = opts.filter_by_name.clone();
        if names.is_empty() {
            let installed = self.installed().await?;
            if installed.is_empty() {
                return Err(ReproError::NoInstalledPackages);
            }
            names = installed.keys().cloned().collect();
        }
        names.sort();

        // --simulate still wants an output directory
        let dummy_dir = std::env::temp_dir().join(format!("repro-fetch-{}", Uuid::new_v4()));
        let mut args = vec![
            "fetch".to_string(),
            "--simulate".to_string(),
            format!("--output={}", dummy_dir.display()),
            "--url".to_string(),
        ];
        args.extend(names);
        let out = self.runner.output("apk", &args).await;
        let _ = tokio::fs::remove_dir_all(&dummy_dir).await;
        let out = out?;

        let mut records = Vec::new();
        for line in out.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(ReproError::Cancelled);
            }
            let url = Url::parse(trimmed).map_err(|e| ReproError::InvalidUrl {
                url: trimmed.to_string(),
                reason: e.to_string(),
            })?;
            records.push(self.record_for_url(cache, &url, cancel).await?);
        }
        if records.is_empty() {
            return Err(ReproError::EmptyIndex(display_command("apk", &args)));
        }
        let written = write_latest(records, version::compare_apk, hw)?;
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
            .get(&id.package)
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

        // apk wants the .apk file name, so link each blob under its basename
        let link_dir = std::env::temp_dir().join(format!("repro-fetch-apk-{}.tmp", Uuid::new_v4()));
        tokio::fs::create_dir_all(&link_dir)
            .await
            .map_err(|e| ReproError::io(format!("creating {}", link_dir.display()), e))?;
        let result = async {
            let mut args = vec!["add".to_string(), "--no-network".to_string()];
            info!(
                "Running '{} ...' with {} packages",
                display_command("apk", &args),
                specs.len()
            );
            for (spec, blob) in &blobs {
                let link = link_path(&link_dir, &spec.basename)?;
                symlink(blob, &link).await?;
                args.push(link.to_string_lossy().into_owned());
            }
            self.runner.run_interactive("apk", &args, cancel).await
        }
        .await;
        let _ = tokio::fs::remove_dir_all(&link_dir).await;
        result
    }

    async fn generate_install_script(
        &self,
        cache: &Cache,
        specs: &[FileSpec],
    ) -> ReproResult<String> {
        let blobs = resolve_blobs(cache, specs).await?;
        let mut out = script::header(self.info.name, blobs.len());
        if blobs.is_empty() {
            return Ok(out);
        }
        out.push_str("dir=$(mktemp -d)\ntrap 'rm -rf \"$dir\"' EXIT\n");
        for (spec, blob) in &blobs {
            out.push_str(&format!(
                "ln -s {} \"$dir\"/{}\n",
                script::sh_quote(&blob.to_string_lossy()),
                script::sh_quote(&spec.basename)
            ));
        }
        out.push_str("apk add --no-network \"$dir\"/*.apk\n");
        Ok(out)
    }
}

/// Join a basename under `dir`, refusing anything that would escape it
fn link_path(dir: &Path, basename: &str) -> ReproResult<PathBuf> {
    if basename.is_empty() || basename.contains('/') || basename == "." || basename == ".." {
        return Err(ReproError::User(format!("Invalid file name {:?}", basename)));
    }
    Ok(dir.join(basename))
}

async fn symlink(target: &Path, link: &Path) -> ReproResult<()> {
    #[cfg(unix)]
    {
        tokio::fs::symlink(target, link).await.map_err(|e| {
            ReproError::io(
                format!("linking {} to {}", link.display(), target.display()),
                e,
            )
        })
    }
    #[cfg(not(unix))]
    {
        tokio::fs::copy(target, link)
            .await
            .map(|_| ())
            .map_err(|e| ReproError::io(format!("copying {}", target.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::opener::testing::MemoryOpener;
    use crate::digest::Sha256Digest;
    use crate::distro::exec::testing::FakeRunner;
    use crate::manifest::HashManifest;
    use tempfile::TempDir;

    const ZLIB_URL: &str = "https://dl-cdn.alpinelinux.org/alpine/v3.16/main/x86_64/zlib-1.2.12-r1.apk";

    #[test]
    fn strips_provider_prefix() {
        let u = Url::parse(
            "https://dl-cdn.alpinelinux.org/alpine/v3.16/main/x86_64/ca-certificates-bundle-20220614-r0.apk",
        )
        .unwrap();
        assert_eq!(
            filename_without_provider(&u).unwrap(),
            "v3.16/main/x86_64/ca-certificates-bundle-20220614-r0.apk"
        );
        let bad = Url::parse("https://example.com/pkgs/foo-1.0-r0.apk").unwrap();
        assert!(filename_without_provider(&bad).is_err());
    }

    #[test]
    fn parse_installed_splits_versions() {
        let pkgs = parse_installed("musl-1.2.3-r0\nca-certificates-bundle-20220614-r0\n").unwrap();
        assert_eq!(pkgs["musl"].version, "1.2.3-r0");
        assert_eq!(pkgs["ca-certificates-bundle"].version, "20220614-r0");
        assert!(parse_installed("garbage\n").is_err());
    }

    #[test]
    fn link_path_rejects_traversal() {
        let dir = Path::new("/tmp/x");
        assert!(link_path(dir, "../etc").is_err());
        assert!(link_path(dir, "..").is_err());
        assert_eq!(link_path(dir, "a.apk").unwrap(), dir.join("a.apk"));
    }

    #[tokio::test]
    async fn generate_hash_requires_cache() {
        let d = Alpine::with_runner(Arc::new(FakeRunner::new()));
        let mut m = HashManifest::new();
        let err = d
            .generate_hash(&mut m, &HashOpts::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReproError::CacheRequired(_)));
    }

    #[tokio::test]
    async fn generate_hash_imports_then_reuses_origin() {
        let dir = TempDir::new().unwrap();
        let opener = Arc::new(MemoryOpener::new());
        opener.serve(ZLIB_URL, b"zlib apk");
        let cache = Cache::with_opener(dir.path(), opener.clone()).await.unwrap();

        let runner = Arc::new(FakeRunner::new());
        runner.respond("apk", &format!("{}\n", ZLIB_URL));
        let d = Alpine::with_runner(runner);
        let opts = HashOpts {
            filter_by_name: vec!["zlib".to_string()],
            cache: Some(&cache),
        };

        for _ in 0..2 {
            let mut m = HashManifest::new();
            d.generate_hash(&mut m, &opts, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(
                m.get("v3.16/main/x86_64/zlib-1.2.12-r1.apk"),
                Some(&Sha256Digest::of_bytes(b"zlib apk"))
            );
        }
        assert_eq!(opener.count(), 1);
    }

    #[tokio::test]
    async fn generate_hash_rejects_plain_http() {
        let dir = TempDir::new().unwrap();
        let opener = Arc::new(MemoryOpener::new());
        let cache = Cache::with_opener(dir.path(), opener.clone()).await.unwrap();
        let runner = Arc::new(FakeRunner::new());
        runner.respond(
            "apk",
            "http://dl-cdn.alpinelinux.org/alpine/v3.16/main/x86_64/zlib-1.2.12-r1.apk\n",
        );
        let d = Alpine::with_runner(runner);
        let opts = HashOpts {
            filter_by_name: vec!["zlib".to_string()],
            cache: Some(&cache),
        };
        let mut m = HashManifest::new();
        let err = d
            .generate_hash(&mut m, &opts, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReproError::UrlScheme { .. }));
        assert_eq!(opener.count(), 0);
    }

    #[tokio::test]
    async fn installed_check() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("apk", "zlib-1.2.12-r1\n");
        let d = Alpine::with_runner(runner);
        let digest = Sha256Digest::of_bytes(b"z");
        let same = FileSpec::new("v3.16/main/x86_64/zlib-1.2.12-r1.apk", digest.clone()).unwrap();
        let older = FileSpec::new("v3.16/main/x86_64/zlib-1.2.12-r0.apk", digest.clone()).unwrap();
        let deb = FileSpec::new("pool/main/z/zlib/zlib1g_1.2_amd64.deb", digest).unwrap();

        assert!(d.is_package_version_installed(&same).await.unwrap());
        assert!(!d.is_package_version_installed(&older).await.unwrap());
        assert!(matches!(
            d.is_package_version_installed(&deb).await,
            Err(ReproError::MissingIdentity { .. })
        ));
        assert_eq!(d.package_name(&same).unwrap(), "zlib");
    }

    #[tokio::test]
    async fn install_script_links_basenames() {
        let dir = TempDir::new().unwrap();
        let opener = Arc::new(MemoryOpener::new());
        opener.serve(ZLIB_URL, b"zlib apk");
        let cache = Cache::with_opener(dir.path(), opener).await.unwrap();
        let digest = Sha256Digest::of_bytes(b"zlib apk");
        cache
            .ensure(&Url::parse(ZLIB_URL).unwrap(), &digest, &CancellationToken::new())
            .await
            .unwrap();

        let d = Alpine::with_runner(Arc::new(FakeRunner::new()));
        let spec = FileSpec::new("v3.16/main/x86_64/zlib-1.2.12-r1.apk", digest).unwrap();
        let script = d.generate_install_script(&cache, &[spec]).await.unwrap();
        assert!(script.contains("'zlib-1.2.12-r1.apk'"));
        assert!(script.contains("apk add --no-network"));
    }
}
