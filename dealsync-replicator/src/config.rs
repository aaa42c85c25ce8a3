use dealsync_config::load_config;
use dealsync_config::shared::ServiceConfig;

use crate::error::{ReplicatorError, ReplicatorResult};

/// Loads and validates the service configuration.
///
/// Uses the standard configuration loading mechanism from [`dealsync_config`] and validates
/// the resulting [`ServiceConfig`] before returning it.
pub fn load_service_config() -> ReplicatorResult<ServiceConfig> {
    let config = load_config::<ServiceConfig>().map_err(ReplicatorError::config)?;
    config.validate().map_err(ReplicatorError::config)?;

    Ok(config)
}
