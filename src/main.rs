mod check;
mod cli;
mod config;
mod runtime;
mod utils;

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use check::orchestrator::Phase;
use check::Collaborators;
use cli::Cli;
use config::Configuration;
use runtime::{DockerCli, NvidiaSmi, ReqwestClient};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut phase = Phase::Init;

    // 配置错误是唯一的致命错误，发生在任何检查之前
    let config = Configuration::from_cli(&cli).context("cannot build configuration")?;
    let deps = Collaborators {
        runtime: Arc::new(DockerCli::new(config.command_timeout)),
        http: Arc::new(ReqwestClient::new().context("cannot build HTTP client")?),
        accelerator: Arc::new(NvidiaSmi::new(config.command_timeout)),
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        eprintln!("\nCtrl+C received, finishing report...");
        let _ = cancel_tx.send(true);
    })
    .context("cannot install Ctrl+C handler")?;

    let report = check::run_diagnostics(&config, &deps, &mut phase, cancel_rx).await;

    check::output::display(&report, &cli.output, &mut phase)?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "svcdiag=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
