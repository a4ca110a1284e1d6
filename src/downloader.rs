//! Fetch orchestrator
//!
//! Resolves wanted file specs against the host, the cache and an ordered
//! provider list. Specs are processed one at a time, sorted by name:
//!
//! 1. skip if the driver reports the exact version installed
//! 2. skip if the digest is already cached
//! 3. try each provider in order; the first `ensure` that succeeds wins
//!
//! A spec that no provider can satisfy aborts the whole batch.

use crate::cache::Cache;
use crate::distro::DistroDriver;
use crate::error::{ReproError, ReproResult};
use crate::filespec::{redact, redact_str, FileSpec};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Orchestrator options
#[derive(Debug, Clone)]
pub struct DownloadOpts {
    /// Provider URL templates; empty means the driver defaults
    pub providers: Vec<String>,
    /// Skip specs whose exact package version is installed
    pub skip_installed: bool,
}

impl Default for DownloadOpts {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            skip_installed: true,
        }
    }
}

/// How a spec was satisfied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Exact version already installed on the host
    AlreadyInstalled,
    /// Digest was already in the cache
    Cached,
    /// Fetched from this provider (redacted template)
    Fetched { provider: String },
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyInstalled => write!(f, "already installed"),
            Self::Cached => write!(f, "cached"),
            Self::Fetched { provider } => write!(f, "fetched from {}", provider),
        }
    }
}

/// A satisfied spec
#[derive(Debug, Clone, Serialize)]
pub struct Downloaded {
    pub spec: FileSpec,
    pub outcome: Outcome,
}

/// Every requested spec, in processing order
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadResult {
    pub entries: Vec<Downloaded>,
}

impl DownloadResult {
    /// Specs that still need installing
    pub fn to_install(&self) -> Vec<FileSpec> {
        self.entries
            .iter()
            .filter(|d| d.outcome != Outcome::AlreadyInstalled)
            .map(|d| d.spec.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Progress notification, emitted once per satisfied spec
#[derive(Debug)]
pub struct Progress<'a> {
    /// 1-based position
    pub index: usize,
    pub total: usize,
    pub downloaded: &'a Downloaded,
}

/// Make every spec satisfied, fetching what is missing
pub async fn download(
    driver: &dyn DistroDriver,
    cache: &Cache,
    specs: &[FileSpec],
    opts: &DownloadOpts,
    cancel: &CancellationToken,
) -> ReproResult<DownloadResult> {
    download_with_progress(driver, cache, specs, opts, cancel, &|_| {}).await
}

/// [`download`], reporting each satisfied spec to `on_progress`
pub async fn download_with_progress(
    driver: &dyn DistroDriver,
    cache: &Cache,
    specs: &[FileSpec],
    opts: &DownloadOpts,
    cancel: &CancellationToken,
    on_progress: &(dyn Fn(Progress<'_>) + Send + Sync),
) -> ReproResult<DownloadResult> {
    let info = driver.info();
    let providers: &[String] = if opts.providers.is_empty() {
        &info.default_providers
    } else {
        &opts.providers
    };
    if providers.is_empty() {
        return Err(ReproError::NoProvider);
    }
    debug!(
        "Providers: {:?}",
        providers.iter().map(|p| redact_str(p)).collect::<Vec<_>>()
    );

    let mut sorted: Vec<&FileSpec> = specs.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let total = sorted.len();
    let mut result = DownloadResult::default();
    for (i, spec) in sorted.into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ReproError::Cancelled);
        }
        let outcome = satisfy(driver, cache, spec, providers, opts.skip_installed, cancel).await?;
        debug!("{}: {}", spec.name, outcome);
        result.entries.push(Downloaded {
            spec: spec.clone(),
            outcome,
        });
        if let Some(downloaded) = result.entries.last() {
            on_progress(Progress {
                index: i + 1,
                total,
                downloaded,
            });
        }
    }
    info!("Satisfied {} file(s)", result.len());
    Ok(result)
}

async fn satisfy(
    driver: &dyn DistroDriver,
    cache: &Cache,
    spec: &FileSpec,
    providers: &[String],
    skip_installed: bool,
    cancel: &CancellationToken,
) -> ReproResult<Outcome> {
    if skip_installed {
        match driver.is_package_version_installed(spec).await {
            Ok(true) => return Ok(Outcome::AlreadyInstalled),
            Ok(false) => {}
            Err(e) => warn!("Failed to check whether {} is installed: {}", spec.name, e),
        }
    }

    match cache.cached(spec.sha256()).await {
        Ok(true) => return Ok(Outcome::Cached),
        Ok(false) => {}
        Err(e) => warn!("Failed to check whether {} is cached: {}", spec.name, e),
    }

    let required_scheme = driver.info().required_scheme;
    let Some((last, earlier)) = providers.split_last() else {
        return Err(ReproError::NoProvider);
    };
    for provider in earlier {
        let url = provider_url(spec, provider, required_scheme)?;
        match cache.ensure(&url, spec.sha256(), cancel).await {
            Ok(()) => {
                return Ok(Outcome::Fetched {
                    provider: redact_str(provider),
                })
            }
            Err(ReproError::Cancelled) => return Err(ReproError::Cancelled),
            Err(e) => warn!("Failed to download {}: {}, trying the next provider", redact(&url), e),
        }
    }

    let url = provider_url(spec, last, required_scheme)?;
    match cache.ensure(&url, spec.sha256(), cancel).await {
        Ok(()) => Ok(Outcome::Fetched {
            provider: redact_str(last),
        }),
        Err(ReproError::Cancelled) => Err(ReproError::Cancelled),
        Err(e) => Err(ReproError::DownloadFailed {
            name: spec.name.clone(),
            url: redact(&url),
            source: Box::new(e),
        }),
    }
}

/// Expand a provider template for `spec`.
///
/// A bad template or a scheme mismatch is a configuration error, not a
/// provider failure.
fn provider_url(spec: &FileSpec, provider: &str, required_scheme: Option<&str>) -> ReproResult<Url> {
    let url = spec.url(provider)?;
    if let Some(expected) = required_scheme {
        if url.scheme() != expected {
            return Err(ReproError::UrlScheme {
                scheme: url.scheme().to_string(),
                url: redact(&url),
                expected: expected.to_string(),
            });
        }
    }
    Ok(url)
}
