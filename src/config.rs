use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cnc::grbl::buffer::GRBL_RX_BUFFER_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub buffer_capacity: usize,
    pub tick_interval_ms: u64,
    pub simulate_motion: bool,
    pub status_poll_interval_ms: u64,
    pub baud_rate: u32,
}
impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            buffer_capacity: GRBL_RX_BUFFER_SIZE,
            tick_interval_ms: 25,
            simulate_motion: true,
            status_poll_interval_ms: 250,
            baud_rate: 115200,
        }
    }
}
impl TrackerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Invalid("buffer_capacity must be positive".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".to_string()));
        }
        if self.status_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("status_poll_interval_ms must be positive".to_string()));
        }
        Ok(())
    }
    pub fn from_json(text: &str) -> Result<TrackerConfig, ConfigError> {
        let config: TrackerConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

pub async fn load_config(path: &Path) -> Result<TrackerConfig, ConfigError> {
    TrackerConfig::from_json(&tokio::fs::read_to_string(path).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = TrackerConfig::from_json(r#"{"tick_interval_ms": 10}"#).unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(10));
        assert_eq!(config.buffer_capacity, 128);
        assert!(config.simulate_motion);
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(matches!(
            TrackerConfig::from_json(r#"{"buffer_capacity": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TrackerConfig::from_json(r#"{"tick_interval_ms": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(TrackerConfig::from_json("{"), Err(ConfigError::Json(_))));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let result = load_config(Path::new("/nonexistent/grbl_tracker.json")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
