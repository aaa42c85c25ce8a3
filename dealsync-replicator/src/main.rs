//! Deal sync service binary.
//!
//! Loads configuration, installs tracing and runs sync passes for every configured client
//! until SIGINT or SIGTERM is received.

use std::process::ExitCode;

use dealsync_config::shared::ServiceConfig;
use tracing::error;

use crate::config::load_service_config;
use crate::core::start_service_with_config;
use crate::error::ReplicatorResult;
use crate::telemetry::init_tracing;

mod config;
mod core;
mod error;
mod telemetry;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration and tracing before the async runtime starts.
fn run() -> ReplicatorResult<()> {
    let service_config = load_service_config()?;

    init_tracing(service_config.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(service_config))?;

    Ok(())
}

async fn async_main(service_config: ServiceConfig) -> ReplicatorResult<()> {
    if let Err(err) = start_service_with_config(service_config).await {
        error!("{err}");
        return Err(err);
    }

    Ok(())
}
