//! Error types for resultflow.
//!
//! All errors in resultflow are strongly typed using thiserror.
//! Failures raised by transform stages and handlers are wrapped into
//! [`DataResultError`] so consumers never observe a raw, unwrapped fault
//! from inside the pipeline.

use std::any::Any;

use thiserror::Error;

use crate::result::Status;

/// Boxed error used as the cause of wrapped failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a registered handler.
pub type HandlerResult = Result<(), BoxError>;

/// Failures raised inside the propagation pipeline.
///
/// The three kinds are distinct so a consumer can tell "my data mapper
/// failed" from "my error mapper failed" from "a handler failed".
#[derive(Debug, Error)]
pub enum DataResultError {
    /// A `map` stage raised.
    #[error("Data transformation failed: {message}")]
    DataTransformation {
        message: String,
        #[source]
        cause: BoxError,
    },

    /// A `map_error` stage raised.
    #[error("Error transformation failed: {message}")]
    ResultTransformation {
        message: String,
        #[source]
        cause: BoxError,
    },

    /// A registered handler raised during dispatch.
    #[error("Handler for {status} emission failed: {message}")]
    Handler {
        status: Status,
        message: String,
        #[source]
        cause: BoxError,
    },
}

impl DataResultError {
    /// Wraps a failed data transform.
    #[must_use]
    pub fn data_transformation(cause: BoxError) -> Self {
        Self::DataTransformation {
            message: cause.to_string(),
            cause,
        }
    }

    /// Wraps a failed error transform.
    #[must_use]
    pub fn result_transformation(cause: BoxError) -> Self {
        Self::ResultTransformation {
            message: cause.to_string(),
            cause,
        }
    }

    /// Wraps a failed handler invocation.
    #[must_use]
    pub fn handler(status: Status, cause: BoxError) -> Self {
        Self::Handler {
            status,
            message: cause.to_string(),
            cause,
        }
    }

    /// Returns true if a data transform failed.
    #[must_use]
    pub const fn is_data_transformation(&self) -> bool {
        matches!(self, Self::DataTransformation { .. })
    }

    /// Returns true if an error transform failed.
    #[must_use]
    pub const fn is_result_transformation(&self) -> bool {
        matches!(self, Self::ResultTransformation { .. })
    }

    /// Returns true if a handler failed.
    #[must_use]
    pub const fn is_handler(&self) -> bool {
        matches!(self, Self::Handler { .. })
    }

    /// The wrapped original fault.
    #[must_use]
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        match self {
            Self::DataTransformation { cause, .. }
            | Self::ResultTransformation { cause, .. }
            | Self::Handler { cause, .. } => cause.as_ref(),
        }
    }
}

/// A panic payload turned into an ordinary error value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("panicked: {message}")]
pub struct PanicError {
    /// Panic message, when the payload was a string.
    pub message: String,
}

impl PanicError {
    /// Converts the payload returned by `std::panic::catch_unwind`.
    #[must_use]
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

/// Validation errors that occur during input validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid result state: {status} {reason}")]
    InvalidResultState {
        status: Status,
        reason: String,
    },

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },
}

/// Errors in the attach/detach lifecycle of a bridge.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge is already attached")]
    AlreadyAttached,

    #[error("Bridge has been detached; create a new bridge to observe again")]
    Detached,

    #[error("Publisher is closed: {path}")]
    PublisherClosed {
        path: String,
    },
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to build log filter: {message}")]
    LogFilter {
        message: String,
    },
}

/// Top-level error type for resultflow.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] DataResultError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl FlowError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a bridge error.
    #[must_use]
    pub const fn is_bridge(&self) -> bool {
        matches!(self, Self::Bridge(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for resultflow operations.
pub type FlowResult<T> = Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_transformation_keeps_cause() {
        let err = DataResultError::data_transformation("boom".into());
        assert!(err.is_data_transformation());
        assert!(!err.is_result_transformation());
        assert_eq!(err.cause().to_string(), "boom");
        let msg = format!("{err}");
        assert!(msg.contains("Data transformation failed"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_result_transformation_is_distinct_kind() {
        let err = DataResultError::result_transformation("bad mapper".into());
        assert!(err.is_result_transformation());
        assert!(!err.is_data_transformation());
        assert!(format!("{err}").contains("Error transformation failed"));
    }

    #[test]
    fn test_handler_error_names_status() {
        let err = DataResultError::handler(Status::Success, "nope".into());
        assert!(err.is_handler());
        let msg = format!("{err}");
        assert!(msg.contains("success"));
        assert!(msg.contains("nope"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_panic_error_from_str_payload() {
        let payload = std::panic::catch_unwind(|| panic!("kaboom")).unwrap_err();
        let err = PanicError::from_payload(payload.as_ref());
        assert_eq!(err.message, "kaboom");
    }

    #[test]
    fn test_panic_error_from_string_payload() {
        let payload = std::panic::catch_unwind(|| panic!("value was {}", 7)).unwrap_err();
        let err = PanicError::from_payload(payload.as_ref());
        assert_eq!(err.message, "value was 7");
    }

    #[test]
    fn test_validation_error_invalid_state() {
        let err = ValidationError::InvalidResultState {
            status: Status::Error,
            reason: "requires an error value".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("Invalid result state"));
        assert!(msg.contains("error"));
    }

    #[test]
    fn test_flow_error_from_bridge() {
        let err: FlowError = BridgeError::AlreadyAttached.into();
        assert!(err.is_bridge());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_flow_error_from_config() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: FlowError = ConfigError::from(parse).into();
        assert!(err.is_config());
        assert!(format!("{err}").contains("parse"));
    }

    #[test]
    fn test_flow_error_internal() {
        let err = FlowError::internal("unexpected state");
        assert!(err.is_internal());
        assert!(format!("{err}").contains("unexpected state"));
    }
}
