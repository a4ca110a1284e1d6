//! Cache command - inspect the content cache

use crate::cache::BlobInfo;
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::cli::AppContext;
use crate::digest::Sha256Digest;
use crate::error::ReproResult;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, app: &AppContext) -> ReproResult<()> {
    match args.action {
        CacheAction::Path => {
            let cache = app.open_cache().await?;
            println!("{}", cache.root().display());
        }
        CacheAction::Ls { format } => {
            let cache = app.open_cache().await?;
            let blobs = cache.list().await?;
            match format {
                OutputFormat::Table => print_table(&blobs),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&blobs)?),
                OutputFormat::Plain => {
                    for blob in &blobs {
                        println!("{}", blob.sha256);
                    }
                }
            }
        }
        CacheAction::Blob { digest } => {
            let digest = Sha256Digest::parse(&digest)?;
            let cache = app.open_cache().await?;
            println!("{}", cache.blob_abs_path(&digest).await?.display());
        }
    }
    Ok(())
}

fn print_table(blobs: &[BlobInfo]) {
    if blobs.is_empty() {
        ui::step_info(&UiContext::detect(), "Cache is empty");
        return;
    }

    println!(
        "{:<64}  {:>12}",
        style("SHA256").bold(),
        style("SIZE").bold()
    );
    let mut total = 0u64;
    for blob in blobs {
        println!("{:<64}  {:>12}", blob.sha256, format_size(blob.size_bytes));
        total += blob.size_bytes;
    }
    println!();
    println!("{} blob(s), {}", blobs.len(), format_size(total));
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
