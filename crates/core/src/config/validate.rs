use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Dispatch concurrency is at least 1
/// - Supervisor timeout is at least 1 second
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.dispatch.max_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "dispatch.max_concurrency must be at least 1".to_string(),
        ));
    }

    if config.supervisor.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "supervisor.timeout_secs must be at least 1".to_string(),
        ));
    }

    Ok(())
}
