//! Pure transform stages over [`DataResult`].
//!
//! Each stage derives a new container from an existing one. A stage that
//! fails (returns `Err` or panics) never lets the fault escape: the output is
//! an `Error` emission wrapping a [`DataResultError`] whose source is the
//! original fault. Stages hold no state between calls.

use std::panic::{self, AssertUnwindSafe};

use crate::error::{BoxError, DataResultError, PanicError};

use super::{DataResult, ErrorValue, Status};

/// Runs `f`, converting a panic into a boxed [`PanicError`].
pub(crate) fn catch_fault<R>(f: impl FnOnce() -> R) -> Result<R, BoxError> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| Box::new(PanicError::from_payload(payload.as_ref())) as BoxError)
}

fn flatten<R, E: Into<BoxError>>(outcome: Result<Result<R, E>, BoxError>) -> Result<R, BoxError> {
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.into()),
        Err(panicked) => Err(panicked),
    }
}

fn data_transformation_failed<R>(cause: BoxError) -> DataResult<R> {
    DataResult {
        data: None,
        error: Some(ErrorValue::new(DataResultError::data_transformation(cause))),
        status: Status::Error,
    }
}

impl<T> DataResult<T> {
    /// Transform the data of a `Success` emission.
    ///
    /// Empty successes stay empty. `Loading` and `Error` emissions pass
    /// through with their data dropped; see [`DataResult::map_retained`] to
    /// carry stale data across. A panic inside `f` yields an `Error`
    /// emission wrapping `DataResultError::DataTransformation`.
    #[must_use]
    pub fn map<R, F>(self, f: F) -> DataResult<R>
    where
        F: FnOnce(T) -> R,
    {
        self.try_map(|data| Ok::<R, BoxError>(f(data)))
    }

    /// Fallible variant of [`DataResult::map`]; an `Err` from `f` becomes an
    /// `Error` emission wrapping `DataResultError::DataTransformation`.
    #[must_use]
    pub fn try_map<R, E, F>(self, f: F) -> DataResult<R>
    where
        E: Into<BoxError>,
        F: FnOnce(T) -> Result<R, E>,
    {
        match self.status {
            Status::Success => match self.data {
                Some(data) => match flatten(catch_fault(|| f(data))) {
                    Ok(mapped) => DataResult::success(mapped),
                    Err(cause) => data_transformation_failed(cause),
                },
                None => DataResult::empty(),
            },
            Status::Loading => DataResult::loading(None),
            Status::Error => DataResult {
                data: None,
                error: self.error,
                status: Status::Error,
            },
        }
    }

    /// Like [`DataResult::map`], but also transforms the stale data carried
    /// by `Loading` and `Error` emissions.
    #[must_use]
    pub fn map_retained<R, F>(self, f: F) -> DataResult<R>
    where
        F: FnOnce(T) -> R,
    {
        let Some(data) = self.data else {
            return DataResult {
                data: None,
                error: self.error,
                status: self.status,
            };
        };

        match catch_fault(|| f(data)) {
            Ok(mapped) => DataResult {
                data: Some(mapped),
                error: self.error,
                status: self.status,
            },
            Err(cause) => data_transformation_failed(cause),
        }
    }

    /// Transform the error of an `Error` emission; other statuses pass
    /// through unchanged. A panic inside `f` yields an `Error` emission
    /// wrapping `DataResultError::ResultTransformation` and keeps the data.
    #[must_use]
    pub fn map_error<F>(self, f: F) -> Self
    where
        F: FnOnce(ErrorValue) -> ErrorValue,
    {
        self.try_map_error(|err| Ok::<ErrorValue, BoxError>(f(err)))
    }

    /// Fallible variant of [`DataResult::map_error`].
    #[must_use]
    pub fn try_map_error<E, F>(self, f: F) -> Self
    where
        E: Into<BoxError>,
        F: FnOnce(ErrorValue) -> Result<ErrorValue, E>,
    {
        let Some(error) = self.error else {
            return self;
        };

        let mapped = match flatten(catch_fault(|| f(error))) {
            Ok(mapped) => mapped,
            Err(cause) => ErrorValue::new(DataResultError::result_transformation(cause)),
        };

        Self {
            data: self.data,
            error: Some(mapped),
            status: Status::Error,
        }
    }
}
