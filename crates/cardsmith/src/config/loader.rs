use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.provider.context_window_tokens == 0 {
        return Err(ConfigError::Validation {
            message: "provider.context_window_tokens must be greater than zero".to_string(),
        });
    }

    if config.provider.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "provider.timeout_secs must be greater than zero".to_string(),
        });
    }

    if config.generation.max_cards == 0 {
        return Err(ConfigError::Validation {
            message: "generation.max_cards must be greater than zero".to_string(),
        });
    }

    if config.generation.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "generation.max_attempts must be greater than zero".to_string(),
        });
    }

    if config.generation.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "generation.worker_count must be greater than zero".to_string(),
        });
    }

    Ok(())
}
