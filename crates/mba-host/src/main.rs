//! mbahost - engine simulator
//!
//! Stands in for the native engine: it hosts the bootstrapper application
//! named by `mbahost.yaml` in `MBAHOST_APP_BASE`, relaunches it while it asks
//! for `ReloadBootstrapper`, and exits with the final result code.

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mba_host::{BootstrapperHost, HostConfig, StandaloneEngine};
use mba_host_sdk::command::LaunchAction;
use mba_host_sdk::{BootstrapperCommand, ShutdownAction};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,mba_host=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting bootstrapper host");

    // Load configuration
    let config = HostConfig::from_env();
    tracing::info!("Configuration loaded: {:?}", config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = BootstrapperCommand::new(LaunchAction::Install).with_command_line(args.join(" "));

    let engine = Arc::new(StandaloneEngine::new());
    let host = BootstrapperHost::new(config.clone());

    let mut reloads = 0;
    let code = loop {
        let run = match host.run_to_completion(engine.clone(), command.clone()) {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(error = %e, "Failed to run bootstrapper application");
                break e.code();
            }
        };

        match run.result.action {
            ShutdownAction::ReloadBootstrapper if reloads < config.max_reloads => {
                reloads += 1;
                tracing::info!(reloads, "Reloading bootstrapper application");
                host.destroy();
            }
            ShutdownAction::ReloadBootstrapper => {
                tracing::warn!(max_reloads = config.max_reloads, "Reload limit reached");
                break run.result.exit_code;
            }
            ShutdownAction::Restart => {
                tracing::warn!("Restart requested, not performed by the simulator");
                break run.result.exit_code;
            }
            ShutdownAction::None => break run.result.exit_code,
        }
    };

    host.destroy();
    tracing::info!(code, "Bootstrapper host exiting");
    std::process::exit(code);
}
