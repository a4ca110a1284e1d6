//! Command-line interface

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};

use crate::cache::Cache;
use crate::config::{Config, ConfigManager};
use crate::distro::{create_driver, DistroDriver};
use crate::error::ReproResult;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Settings resolved from flags and config, shared by all commands
pub struct AppContext {
    pub config: Config,
    pub config_manager: ConfigManager,
    pub cache_dir: PathBuf,
    pub distro: String,
    pub cancel: CancellationToken,
}

impl AppContext {
    /// Flags override config values
    pub fn new(
        cli: &Cli,
        config: Config,
        config_manager: ConfigManager,
        cancel: CancellationToken,
    ) -> Self {
        let cache_dir = cli
            .cache
            .clone()
            .unwrap_or_else(|| ConfigManager::cache_dir(&config));
        let distro = cli
            .distro
            .clone()
            .unwrap_or_else(|| config.distro.name.clone());
        Self {
            config,
            config_manager,
            cache_dir,
            distro,
            cancel,
        }
    }

    /// Instantiate the selected distro driver
    pub fn driver(&self) -> ReproResult<Box<dyn DistroDriver>> {
        let driver = create_driver(&self.distro)?;
        if driver.info().experimental {
            warn!("Distro driver {:?} is experimental", driver.info().name);
        }
        Ok(driver)
    }

    /// Open (creating if needed) the content cache
    pub async fn open_cache(&self) -> ReproResult<Cache> {
        Cache::open(&self.cache_dir).await
    }

    /// Providers from the command line, else from the config
    pub fn providers(&self, from_cli: &[String]) -> Vec<String> {
        if from_cli.is_empty() {
            self.config.providers.urls.clone()
        } else {
            from_cli.to_vec()
        }
    }
}
