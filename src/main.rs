//! SheetPulse - multi-tenant metrics sync orchestrator
//!
//! Main entry point for the SheetPulse daemon and its management CLI.

mod cli;
mod commands;
mod logging;

use clap::Parser;
use tracing::{error, warn};

use sheetpulse_config::{ConfigLoader, ConfigValidator};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_or_default(cli.config.as_deref())?;

    let command = match cli.command.unwrap_or(Commands::Run) {
        Commands::CheckConfig => return commands::check_config(&config, cli.config.as_deref()),
        Commands::NextRun {
            cron,
            tz,
            after,
            count,
        } => return commands::next_run(&cron, &tz, after, count),
        command => command,
    };

    logging::init_tracing(&config.logging)?;

    match ConfigValidator::validate(&config).into_result() {
        Ok(warnings) => {
            for w in warnings {
                warn!("Config {}: {}", w.path, w.message);
            }
        }
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    }

    match command {
        Commands::Run => commands::run(config).await,
        Commands::Credential { action } => commands::credential(config, action).await,
        Commands::Service { action } => commands::service(config, action).await,
        Commands::Schedule { action } => commands::schedule(config, action).await,
        Commands::Queue { action } => commands::queue(config, action).await,
        Commands::Trigger { tenant, service, date } => commands::trigger(config, &tenant, service, date).await,
        Commands::Audit {
            tenant,
            action,
            service,
            limit,
            offset,
        } => commands::audit(config, &tenant, action, service, limit, offset).await,
        Commands::CheckConfig | Commands::NextRun { .. } => Ok(()),
    }
}
