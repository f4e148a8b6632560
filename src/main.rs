use std::process::ExitCode;

use anyhow::Context;
use tokio::runtime::Builder;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use yadisk_photos::cli::{Cli, CommandFactory, Parser};
use yadisk_photos::pipeline::launch;

const DEFAULT_LOG_FILTER: &str = "info";

#[inline]
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[inline]
fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn main() -> anyhow::Result<ExitCode> {
    // here, if parse fails, the program exits with clap's usage error code,
    // which is fine because nothing needs cleaning up yet.
    let cli = Cli::parse();
    init_tracing();

    let config = match Cli::resolve_config(cli.config, &mut Cli::command(), env_lookup) {
        Ok(config) => config,
        Err(err) => {
            let _ = err.print();
            return Ok(ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(2)));
        }
    };

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let exit_code = runtime.block_on(async {
        tokio::select! {
            exit_code = launch(config, env_lookup) => {exit_code},
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Ctrl-C received, exiting..."),
                    Err(err) => error!("failed to listen for ctrl-c signal: {err}"),
                }
                ExitCode::SUCCESS
            },
        }
    });

    Ok(exit_code)
}
