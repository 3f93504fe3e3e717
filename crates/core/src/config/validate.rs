use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Source names are non-empty and unique
/// - Source paths are non-empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Sources validation
    let mut names = HashSet::new();
    for source in &config.sources.json {
        if source.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "sources.json.name cannot be empty".to_string(),
            ));
        }
        if source.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "sources.json '{}' has an empty path",
                source.name
            )));
        }
        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }
    }

    Ok(())
}
