mod bootstrap;
mod check;
mod health;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cortex_relay_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "cortex-relay",
    about = "Slack bot that relays questions to a Cortex Agent",
    after_help = "Examples:\n  cortex-relay\n  cortex-relay --config cortex-relay.toml --require-config\n  cortex-relay --check"
)]
struct Args {
    #[arg(long, value_name = "PATH", help = "Read configuration from this TOML file")]
    config: Option<PathBuf>,
    #[arg(long, help = "Fail when no configuration file is found")]
    require_config: bool,
    #[arg(long, help = "Validate configuration, print a redacted summary, and exit")]
    check: bool,
}

impl Args {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.require_config,
            ..LoadOptions::default()
        }
    }
}

fn init_logging(config: &AppConfig) {
    use cortex_relay_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // A missing .env is normal outside local development.
    dotenvy::dotenv().ok();

    let config = AppConfig::load(args.load_options()).context("invalid configuration")?;
    if args.check {
        println!("{}", check::summary(&config));
        return Ok(());
    }

    init_logging(&config);
    run(config).await
}

async fn run(config: AppConfig) -> Result<()> {
    let app = bootstrap::bootstrap_with_config(config)?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.config.agent.endpoint_host(),
    )
    .await
    .context("could not start the health endpoint")?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        slash_command = %app.config.slack.command,
        "cortex-relay started"
    );

    tokio::select! {
        result = app.slack_runner.start() => {
            result.context("socket mode stopped")?;
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "socket mode stream closed"
            );
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("could not listen for shutdown signal")?;
            tracing::info!(
                event_name = "system.server.stopping",
                correlation_id = "shutdown",
                "shutdown signal received"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Args;

    #[test]
    fn flags_map_to_load_options() {
        let args = Args::parse_from([
            "cortex-relay",
            "--config",
            "/etc/cortex-relay.toml",
            "--require-config",
        ]);
        let options = args.load_options();

        assert_eq!(
            options.config_path.as_deref(),
            Some(std::path::Path::new("/etc/cortex-relay.toml"))
        );
        assert!(options.require_file);
        assert!(!args.check);
    }

    #[test]
    fn defaults_discover_config_without_requiring_it() {
        let options = Args::parse_from(["cortex-relay"]).load_options();
        assert!(options.config_path.is_none());
        assert!(!options.require_file);
    }
}
