//! Script command - print an install script for cached files

use crate::cli::args::ScriptArgs;
use crate::cli::commands::load_specs;
use crate::cli::AppContext;
use crate::error::ReproResult;
use std::path::PathBuf;

const DEFAULT_MANIFEST: &str = "SHA256SUMS";

/// Execute the script command
pub async fn execute(args: ScriptArgs, app: &AppContext) -> ReproResult<()> {
    let manifests = if args.manifests.is_empty() {
        vec![PathBuf::from(DEFAULT_MANIFEST)]
    } else {
        args.manifests
    };
    let specs = load_specs(&manifests).await?;
    let driver = app.driver()?;
    let cache = app.open_cache().await?;

    let script = driver.generate_install_script(&cache, &specs).await?;
    print!("{}", script);
    Ok(())
}
