//! Distro drivers
//!
//! Abstraction over a package ecosystem's enumeration and installation
//! tooling:
//! - debian / ubuntu: dpkg + apt
//! - alpine: apk (experimental)
//! - none: generic files only, nothing can be installed
//!
//! A capability a variant lacks returns [`ReproError::Unsupported`] instead of
//! panicking, so callers handle every driver the same way.

pub mod alpine;
pub mod debian;
mod exec;
pub mod generate;
pub mod none;
mod script;

pub use alpine::Alpine;
pub use debian::Debian;
pub use exec::{CommandRunner, SystemRunner};
pub use generate::{write_latest, IndexRecord};
pub use none::NoneDriver;

use crate::cache::Cache;
use crate::error::{ReproError, ReproResult};
use crate::filespec::FileSpec;
use crate::manifest::HashWriter;
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Static facts about a driver
#[derive(Debug, Clone)]
pub struct DistroInfo {
    /// Driver name (`debian`, `ubuntu`, `alpine`, `none`)
    pub name: &'static str,
    /// Provider URL templates used when the user configures none
    pub default_providers: Vec<String>,
    /// Driver is not considered stable
    pub experimental: bool,
    /// `generate_hash` must download files to learn their digests
    pub cache_needed_for_hash: bool,
    /// Only provider URLs with this scheme are fetched
    pub required_scheme: Option<&'static str>,
}

/// Options for hash generation
#[derive(Default)]
pub struct HashOpts<'a> {
    /// Package names; empty means every installed package
    pub filter_by_name: Vec<String>,
    /// Needed when [`DistroInfo::cache_needed_for_hash`] is set
    pub cache: Option<&'a Cache>,
}

/// Package ecosystem driver
#[async_trait]
pub trait DistroDriver: Send + Sync {
    /// Static driver facts
    fn info(&self) -> &DistroInfo;

    /// Write a hash manifest entry for each requested package
    async fn generate_hash(
        &self,
        hw: &mut dyn HashWriter,
        opts: &HashOpts<'_>,
        cancel: &CancellationToken,
    ) -> ReproResult<()>;

    /// Package name of a file spec
    fn package_name(&self, spec: &FileSpec) -> ReproResult<String>;

    /// Whether the exact package version of `spec` is installed
    async fn is_package_version_installed(&self, spec: &FileSpec) -> ReproResult<bool>;

    /// Install cache-resident files with the host package manager
    async fn install(
        &self,
        cache: &Cache,
        specs: &[FileSpec],
        cancel: &CancellationToken,
    ) -> ReproResult<()>;

    /// Render a shell script that installs cache-resident files
    async fn generate_install_script(&self, cache: &Cache, specs: &[FileSpec])
        -> ReproResult<String>;
}

/// Driver names accepted by [`create_driver`]
pub const DRIVER_NAMES: &[&str] = &["auto", "debian", "ubuntu", "alpine", "none"];

/// Create a driver by name; `auto` detects the host distro
pub fn create_driver(name: &str) -> ReproResult<Box<dyn DistroDriver>> {
    let name = if name == "auto" {
        let detected = detect_host(Path::new("/etc/os-release"));
        debug!("Detected distro driver: {}", detected);
        detected
    } else {
        name
    };
    match name {
        debian::NAME_DEBIAN => Ok(Box::new(Debian::new())),
        debian::NAME_UBUNTU => Ok(Box::new(Debian::ubuntu())),
        alpine::NAME => Ok(Box::new(Alpine::new())),
        none::NAME => Ok(Box::new(NoneDriver::new())),
        other => Err(ReproError::UnknownDistro(other.to_string())),
    }
}

/// Pick a driver name from an os-release file
pub fn detect_host(os_release: &Path) -> &'static str {
    match std::fs::read_to_string(os_release) {
        Ok(content) => detect_from_os_release(&content),
        Err(_) => none::NAME,
    }
}

fn detect_from_os_release(content: &str) -> &'static str {
    let mut id = "";
    let mut id_like = "";
    for line in content.lines() {
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "ID" => id = value,
                "ID_LIKE" => id_like = value,
                _ => {}
            }
        }
    }
    match id {
        "debian" => debian::NAME_DEBIAN,
        "ubuntu" => debian::NAME_UBUNTU,
        "alpine" => alpine::NAME,
        _ if id_like.split_whitespace().any(|s| s == "ubuntu") => debian::NAME_UBUNTU,
        _ if id_like.split_whitespace().any(|s| s == "debian") => debian::NAME_DEBIAN,
        _ => none::NAME,
    }
}

/// Resolve every spec to its blob path before anything is installed
pub(crate) async fn resolve_blobs(
    cache: &Cache,
    specs: &[FileSpec],
) -> ReproResult<Vec<(FileSpec, std::path::PathBuf)>> {
    let mut blobs = Vec::with_capacity(specs.len());
    for spec in specs {
        let path = cache.blob_abs_path(spec.sha256()).await?;
        blobs.push((spec.clone(), path));
    }
    Ok(blobs)
}
