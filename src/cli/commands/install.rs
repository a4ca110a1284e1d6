//! Install command - fetch, then hand the files to the package manager

use crate::cli::args::InstallArgs;
use crate::cli::commands::fetch;
use crate::cli::AppContext;
use crate::error::ReproResult;
use crate::ui::{self, UiContext};

/// Execute the install command
pub async fn execute(args: InstallArgs, app: &AppContext) -> ReproResult<()> {
    let driver = app.driver()?;
    let cache = app.open_cache().await?;
    let result = fetch(
        app,
        driver.as_ref(),
        &cache,
        &args.manifests,
        &args.providers,
        app.config.download.skip_installed,
    )
    .await?;

    let ctx = UiContext::detect();
    let to_install = result.to_install();
    if to_install.is_empty() {
        ui::step_ok(&ctx, "Nothing to install");
        return Ok(());
    }

    ui::step_info(
        &ctx,
        &format!("Installing {} package(s) with {}", to_install.len(), driver.info().name),
    );
    driver.install(&cache, &to_install, &app.cancel).await?;
    ui::step_ok(&ctx, "Installed");
    Ok(())
}
