//! Runtime configuration.
//!
//! Configuration is plain JSON deserialized with `serde`; every field has a
//! default, so an empty object (or no file at all) yields a working setup.
//!
//! ```json
//! {
//!   "log_level": "debug",
//!   "catch_handler_panics": true,
//!   "channel": { "emission_queue_capacity": 64 }
//! }
//! ```

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, FlowResult, ValidationError};
use crate::publisher::ChannelPublisherConfig;

/// Queue sizing for channel-backed publishers.
pub type ChannelConfig = ChannelPublisherConfig;

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Default filter directive for the log registry. `RUST_LOG` wins when
    /// set.
    pub log_level: String,
    /// Convert handler panics into handler faults instead of unwinding
    /// through the publisher.
    pub catch_handler_panics: bool,
    pub channel: ChannelConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            catch_handler_panics: true,
            channel: ChannelConfig::default(),
        }
    }
}

impl FlowConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> FlowResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate JSON from a reader.
    pub fn from_reader<R: Read>(reader: R) -> FlowResult<Self> {
        let config: Self = serde_json::from_reader(reader).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> FlowResult<Self> {
        let file = std::fs::File::open(path).map_err(ConfigError::from)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.log_level.trim().is_empty() {
            return Err(invalid("log_level", "must not be empty"));
        }
        if self.channel.emission_queue_capacity == 0 {
            return Err(invalid("channel.emission_queue_capacity", "must be greater than zero"));
        }
        if self.channel.control_queue_capacity == 0 {
            return Err(invalid("channel.control_queue_capacity", "must be greater than zero"));
        }
        Ok(())
    }

    /// Set the log level directive.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Toggle panic isolation in handlers.
    #[must_use]
    pub const fn with_catch_handler_panics(mut self, catch: bool) -> Self {
        self.catch_handler_panics = catch;
        self
    }
}

fn invalid(field: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = FlowConfig::from_json_str("{}").unwrap();
        assert_eq!(config, FlowConfig::default());
        assert_eq!(config.log_level, "info");
        assert!(config.catch_handler_panics);
        assert_eq!(config.channel.emission_queue_capacity, 1024);
        assert_eq!(config.channel.control_queue_capacity, 256);
    }

    #[test]
    fn partial_channel_section_keeps_other_defaults() {
        let config = FlowConfig::from_json_str(r#"{"channel": {"emission_queue_capacity": 8}}"#).unwrap();
        assert_eq!(config.channel.emission_queue_capacity, 8);
        assert_eq!(config.channel.control_queue_capacity, 256);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = FlowConfig::from_json_str(r#"{"channel": {"control_queue_capacity": 0}}"#).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("control_queue_capacity"));
    }

    #[test]
    fn blank_level_is_rejected() {
        let err = FlowConfig::default().with_log_level("  ").validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidConfig { .. }));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = FlowConfig::from_json_str("{ nope").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"log_level": "resultflow=trace", "catch_handler_panics": false}}"#).unwrap();

        let config = FlowConfig::from_path(file.path()).unwrap();
        assert_eq!(config.log_level, "resultflow=trace");
        assert!(!config.catch_handler_panics);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FlowConfig::from_path(dir.path().join("absent.json")).unwrap_err();
        assert!(err.is_config());
    }
}
