pub mod cli;
pub mod core;
pub mod providers;
pub mod service;
pub mod store;
pub mod sync;

use crate::cli::QueryArgs;
use crate::core::config::AppConfig;
use crate::core::window::Period;
use crate::service::BenchmarkService;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Sync { period: Period },
    Returns(QueryArgs),
    Chart(QueryArgs),
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("xbench starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let store = store::open_store(&config)?;

    match command {
        AppCommand::Sync { period } => {
            let providers = providers::build_providers(&config);
            cli::sync::run(&config.instruments, &providers, store.as_ref(), period).await
        }
        AppCommand::Returns(args) => {
            let service = BenchmarkService::from_config(&config, store);
            cli::returns::run(&service, &args).await
        }
        AppCommand::Chart(args) => {
            let service = BenchmarkService::from_config(&config, store);
            cli::chart::run(&service, &args).await
        }
    }
}
