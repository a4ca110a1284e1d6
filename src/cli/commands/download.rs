//! Download command - fetch manifest entries into the cache

use crate::cli::args::DownloadArgs;
use crate::cli::commands::fetch;
use crate::cli::AppContext;
use crate::error::ReproResult;
use crate::ui::{self, UiContext};

/// Execute the download command
pub async fn execute(args: DownloadArgs, app: &AppContext) -> ReproResult<()> {
    let skip_installed = app.config.download.skip_installed && !args.no_skip_installed;
    let driver = app.driver()?;
    let cache = app.open_cache().await?;
    let result = fetch(
        app,
        driver.as_ref(),
        &cache,
        &args.manifests,
        &args.providers,
        skip_installed,
    )
    .await?;

    let to_install = result.to_install();
    let ctx = UiContext::detect();
    if to_install.is_empty() {
        ui::step_ok(&ctx, "Nothing to install");
        return Ok(());
    }
    ui::step_ok_detail(
        &ctx,
        &format!("{} file(s) ready to install", to_install.len()),
        &cache.root().display().to_string(),
    );
    for spec in &to_install {
        println!("{}", spec.name);
    }
    Ok(())
}
