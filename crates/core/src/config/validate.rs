use super::{
    types::{Config, QueueConfig},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Keepalive interval and event buffer are not 0
/// - Every queue runs at least one job and admits at least `parallelize`
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.server.keepalive_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "server.keepalive_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.processing.event_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "processing.event_buffer cannot be 0".to_string(),
        ));
    }

    validate_queue("audio", &config.audio)?;
    validate_queue("video", &config.video)?;
    validate_queue("image", &config.image)?;

    Ok(())
}

fn validate_queue(section: &str, queue: &QueueConfig) -> Result<(), ConfigError> {
    if queue.parallelize == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{}.parallelize cannot be 0",
            section
        )));
    }
    if queue.max < queue.parallelize {
        return Err(ConfigError::ValidationError(format!(
            "{}.max ({}) cannot be lower than {}.parallelize ({})",
            section, queue.max, section, queue.parallelize
        )));
    }
    Ok(())
}
