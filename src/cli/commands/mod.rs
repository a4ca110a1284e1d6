//! CLI command implementations

pub mod cache;
pub mod config;
pub mod download;
pub mod hash;
pub mod install;
pub mod script;

pub use cache::execute as cache;
pub use config::execute as config;
pub use download::execute as download;
pub use hash::execute as hash;
pub use install::execute as install;
pub use script::execute as script;

use crate::cache::Cache;
use crate::cli::AppContext;
use crate::distro::DistroDriver;
use crate::downloader::{self, DownloadOpts, DownloadResult};
use crate::error::ReproResult;
use crate::filespec::FileSpec;
use crate::manifest::HashManifest;
use crate::ui::{self, UiContext};
use std::path::PathBuf;
use tracing::debug;

/// Merge manifests in order (a later entry for a filename wins) into specs
pub(crate) async fn load_specs(paths: &[PathBuf]) -> ReproResult<Vec<FileSpec>> {
    let mut merged = HashManifest::new();
    for path in paths {
        let manifest = HashManifest::from_file(path).await?;
        debug!("Loaded {} entries from {}", manifest.len(), path.display());
        merged.extend(manifest);
    }
    merged
        .iter()
        .map(|(name, digest)| FileSpec::new(name, digest.clone()))
        .collect()
}

/// Run the fetch orchestrator with per-file progress lines
pub(crate) async fn fetch(
    app: &AppContext,
    driver: &dyn DistroDriver,
    cache: &Cache,
    manifests: &[PathBuf],
    providers: &[String],
    skip_installed: bool,
) -> ReproResult<DownloadResult> {
    let specs = load_specs(manifests).await?;
    let opts = DownloadOpts {
        providers: app.providers(providers),
        skip_installed,
    };

    let ctx = UiContext::detect();
    let result = downloader::download_with_progress(
        driver,
        cache,
        &specs,
        &opts,
        &app.cancel,
        &|p| {
            ui::progress(
                &ctx,
                p.index,
                p.total,
                &p.downloaded.spec.basename,
                &p.downloaded.outcome.to_string(),
            )
        },
    )
    .await?;
    Ok(result)
}
