use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use netpulse_service::config::{Config, resolve_config_path};
use netpulse_service::health::check_health;
use netpulse_service::monitoring::CycleLimit;
use netpulse_service::orchestrator::Orchestrator;

#[derive(Debug, Parser)]
#[command(name = "netpulse", version, about = "Periodic HTTP and ping monitor for a set of sites")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/netpulse/config.toml)
    #[arg(short, long, env = "NETPULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single monitoring cycle and exit
    #[arg(long, conflicts_with_all = ["cleanup", "health_check"])]
    once: bool,

    /// Delete observations older than the retention period and exit
    #[arg(long, conflicts_with = "health_check")]
    cleanup: bool,

    /// Exit 0 if the monitor has recorded observations, 1 otherwise
    #[arg(long)]
    health_check: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal, shutting down gracefully"),
            Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received terminate signal, shutting down gracefully");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = resolve_config_path(cli.config.as_ref())?;

    if cli.health_check {
        let config = Config::load_existing(Some(&config_path))?;
        let report = check_health(&config.database.path).await?;
        println!("{}", report);
        return Ok(if report.is_healthy() { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    let config = Config::load(Some(&config_path))?;

    if cli.show_config {
        println!("Config file: {}", config_path.display());
        println!("{}", config);
        return Ok(ExitCode::SUCCESS);
    }

    let orchestrator = Orchestrator::new(config, config_path).await?;

    if cli.cleanup {
        let deleted = orchestrator.cleanup().await?;
        println!("Deleted {} expired observations", deleted);
        return Ok(ExitCode::SUCCESS);
    }

    if cli.once {
        orchestrator.run(CycleLimit::ONCE).await?;
        return Ok(ExitCode::SUCCESS);
    }

    tokio::select! {
        result = orchestrator.run(CycleLimit::Unbounded) => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("Network monitor stopped");
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    logger::init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
