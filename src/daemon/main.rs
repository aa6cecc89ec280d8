use std::process;

use tokio::net::TcpListener;
use tracing::{error, info};

use drkey::config::init_config;
use drkey::daemon::{serve, AppState};
use drkey::errors::DrkeyResult;
use drkey::logging::init_tracing;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Daemon exited with error");
        eprintln!("drkey_daemon: {e}");
        process::exit(1);
    }
}

async fn run() -> DrkeyResult<()> {
    let config = init_config()?;
    init_tracing(&config.logging);

    let state = AppState::from_config(config)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    info!(
        addr = %addr,
        epoch_duration_secs = config.server.epoch_duration_secs,
        "drkey_daemon listening"
    );

    serve(listener, state).await
}
