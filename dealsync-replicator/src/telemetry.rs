use dealsync_config::shared::LogFormat;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{ReplicatorError, ReplicatorResult};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "dealsync=info,dealsync_replicator=info";

/// Installs the global subscriber, writing text or JSON lines to stdout.
pub fn init_tracing(format: LogFormat) -> ReplicatorResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    }
    .map_err(ReplicatorError::config)
}
