//! The result container emitted through the pipeline.
//!
//! A [`DataResult`] is one emission: a status plus optional data and an
//! optional error. The factories enforce the status/error invariants at
//! construction time, so every value observed downstream is well formed:
//!
//! - `Success` never carries an error.
//! - `Error` always carries an error.
//! - `Loading` may carry stale data from a prior success, never an error.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{BoxError, DataResultError, ValidationError};

/// Transform stages (`map`, `map_error`, ...).
pub mod transform;

/// Status of an emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Work in progress; may carry stale data.
    Loading,
    /// Completed; may carry data (absent data means "empty").
    Success,
    /// Failed; always carries an error.
    Error,
}

impl Status {
    /// Lowercase name, as used in logs and serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, cheaply clonable error carried by an `Error` emission.
///
/// Two values are equal when they share the same allocation or render the
/// same message, which keeps [`DataResult`] equality structural.
#[derive(Clone)]
pub struct ErrorValue(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl ErrorValue {
    /// Wraps a concrete error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Wraps an already boxed error.
    #[must_use]
    pub fn from_boxed(error: BoxError) -> Self {
        Self(Arc::from(error))
    }

    /// Builds an error value from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::from_boxed(message.into().into())
    }

    /// Borrow the underlying error.
    #[must_use]
    pub fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }

    /// Attempt to view the underlying error as a concrete type.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Returns the pipeline failure, if this error was produced by a
    /// transform stage or a handler.
    #[must_use]
    pub fn pipeline_error(&self) -> Option<&DataResultError> {
        self.downcast_ref::<DataResultError>()
    }

    /// Returns true if both values share the same allocation.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl<E> From<E> for ErrorValue
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl PartialEq for ErrorValue {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other) || self.0.to_string() == other.0.to_string()
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One emission: data, error, status.
///
/// Immutable once constructed. Build it with [`DataResult::loading`],
/// [`DataResult::success`], [`DataResult::empty`] or [`DataResult::error`];
/// [`DataResult::new`] validates arbitrary combinations.
#[derive(Debug, Clone, PartialEq)]
pub struct DataResult<T> {
    data: Option<T>,
    error: Option<ErrorValue>,
    status: Status,
}

impl<T> DataResult<T> {
    /// A loading emission, optionally carrying stale data for in-place refresh.
    #[must_use]
    pub const fn loading(data: Option<T>) -> Self {
        Self {
            data,
            error: None,
            status: Status::Loading,
        }
    }

    /// A successful emission carrying data.
    #[must_use]
    pub const fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            status: Status::Success,
        }
    }

    /// A successful emission with no data.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            data: None,
            error: None,
            status: Status::Success,
        }
    }

    /// A failed emission, optionally keeping the last known data.
    pub fn error(error: impl Into<ErrorValue>, data: Option<T>) -> Self {
        Self {
            data,
            error: Some(error.into()),
            status: Status::Error,
        }
    }

    /// Validated constructor for arbitrary combinations.
    ///
    /// Returns `ValidationError::InvalidResultState` when `Success` or
    /// `Loading` carries an error, or `Error` lacks one.
    pub fn new(status: Status, data: Option<T>, error: Option<ErrorValue>) -> Result<Self, ValidationError> {
        match (status, &error) {
            (Status::Success | Status::Loading, Some(_)) => Err(ValidationError::InvalidResultState {
                status,
                reason: "must not carry an error".to_string(),
            }),
            (Status::Error, None) => Err(ValidationError::InvalidResultState {
                status,
                reason: "requires an error value".to_string(),
            }),
            _ => Ok(Self { data, error, status }),
        }
    }

    /// Emission status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Data, if any.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Error, present exactly when the status is `Error`.
    #[must_use]
    pub const fn error_value(&self) -> Option<&ErrorValue> {
        self.error.as_ref()
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.status, Status::Loading)
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, Status::Success)
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.status, Status::Error)
    }

    /// A `Success` emission without data.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.is_success() && self.data.is_none()
    }

    /// Consume the emission, keeping only its data.
    #[must_use]
    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Consume the emission into `(status, data, error)`.
    #[must_use]
    pub fn into_parts(self) -> (Status, Option<T>, Option<ErrorValue>) {
        (self.status, self.data, self.error)
    }

    /// Borrowing view with the same status and error.
    #[must_use]
    pub fn as_ref(&self) -> DataResult<&T> {
        DataResult {
            data: self.data.as_ref(),
            error: self.error.clone(),
            status: self.status,
        }
    }
}

impl<T: Serialize> Serialize for DataResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DataResult", 3)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("data", &self.data)?;
        state.serialize_field("error", &self.error.as_ref().map(ToString::to_string))?;
        state.end()
    }
}
