//! Null driver for generic files
//!
//! Nothing is ever reported installed, so downloads still work; everything
//! that needs a package manager is unsupported.

use crate::cache::Cache;
use crate::distro::{DistroDriver, DistroInfo, HashOpts};
use crate::error::{ReproError, ReproResult};
use crate::filespec::FileSpec;
use crate::manifest::HashWriter;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub const NAME: &str = "none";

fn unsupported(feature: &'static str) -> ReproError {
    ReproError::Unsupported {
        distro: NAME,
        feature,
    }
}

pub struct NoneDriver {
    info: DistroInfo,
}

impl NoneDriver {
    pub fn new() -> Self {
        Self {
            info: DistroInfo {
                name: NAME,
                default_providers: Vec::new(),
                experimental: false,
                cache_needed_for_hash: false,
                required_scheme: None,
            },
        }
    }
}

impl Default for NoneDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DistroDriver for NoneDriver {
    fn info(&self) -> &DistroInfo {
        &self.info
    }

    async fn generate_hash(
        &self,
        _hw: &mut dyn HashWriter,
        _opts: &HashOpts<'_>,
        _cancel: &CancellationToken,
    ) -> ReproResult<()> {
        Err(unsupported("hash generation"))
    }

    fn package_name(&self, _spec: &FileSpec) -> ReproResult<String> {
        Err(unsupported("package names"))
    }

    async fn is_package_version_installed(&self, _spec: &FileSpec) -> ReproResult<bool> {
        Ok(false)
    }

    async fn install(
        &self,
        _cache: &Cache,
        specs: &[FileSpec],
        _cancel: &CancellationToken,
    ) -> ReproResult<()> {
        if specs.is_empty() {
            return Ok(());
        }
        Err(unsupported("installation"))
    }

    async fn generate_install_script(
        &self,
        _cache: &Cache,
        _specs: &[FileSpec],
    ) -> ReproResult<String> {
        Err(unsupported("install scripts"))
    }
}
