//! Hash command - generate hash manifests

use crate::cli::args::{HashAction, HashArgs};
use crate::cli::AppContext;
use crate::distro::HashOpts;
use crate::error::{ReproError, ReproResult};
use crate::manifest::{DedupeWriter, HashManifest, ManifestWriter};
use std::io::{BufWriter, Write};
use tracing::info;

/// Execute the hash command
pub async fn execute(args: HashArgs, app: &AppContext) -> ReproResult<()> {
    match args.action {
        HashAction::Generate { dedupe, packages } => {
            let driver = app.driver()?;
            let cache = if driver.info().cache_needed_for_hash {
                Some(app.open_cache().await?)
            } else {
                None
            };
            let prior = match &dedupe {
                Some(path) => Some(HashManifest::from_file(path).await?),
                None => None,
            };
            let opts = HashOpts {
                filter_by_name: packages,
                cache: cache.as_ref(),
            };

            let mut out = ManifestWriter::new(BufWriter::new(std::io::stdout()));
            match &prior {
                Some(prior) => {
                    info!("Deduplicating against {} entries", prior.len());
                    let mut dedupe = DedupeWriter::new(prior, &mut out);
                    driver.generate_hash(&mut dedupe, &opts, &app.cancel).await?;
                }
                None => driver.generate_hash(&mut out, &opts, &app.cancel).await?,
            }
            flush(out)
        }
    }
}

fn flush<W: Write + Send>(out: ManifestWriter<W>) -> ReproResult<()> {
    out.into_inner()
        .flush()
        .map_err(|e| ReproError::io("flushing stdout", e))
}
