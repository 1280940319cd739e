//! mobile-deck - iOS simulators and Android emulators with live app logs
//!
//! This is the binary entry point. All logic lives in the library.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use mdeck_app::config::{init_config_dir, load_settings};
use mdeck_app::{Orchestrator, SystemRunner, ToolLocator};
use mobile_deck::cli::{Command, ConfigCommand};
use mobile_deck::{execute, Cli, HeadlessEvent, Reporter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Logging goes to a file; a failure here must not block the command
    if let Err(e) = mdeck_core::logging::init() {
        eprintln!("Warning: file logging disabled: {}", e);
    }

    let reporter = Reporter::new(cli.json);

    if let Command::Config {
        command: ConfigCommand::Init,
    } = &cli.command
    {
        let path = init_config_dir(cli.config.as_deref())?;
        reporter.emit(&HeadlessEvent::config_written(&path));
        return Ok(());
    }

    let settings = load_settings(cli.config.as_deref());
    let locator = ToolLocator::new(settings.locator_config());
    let runner = Arc::new(SystemRunner::new(locator.clone()));
    let orchestrator = Orchestrator::new(runner, locator, settings);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    match execute(&orchestrator, cli.command, &reporter, shutdown).await {
        Ok(()) => {
            info!("mobile-deck exiting");
            Ok(())
        }
        Err(e) if reporter.is_json() => {
            error!("Command failed: {}", e);
            reporter.emit(&HeadlessEvent::error(&e));
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
