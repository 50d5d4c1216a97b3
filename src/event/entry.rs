//! Registered handler entries.

use std::fmt;

use crate::error::{HandlerResult, PanicError};
use crate::result::{DataResult, Status};

/// Whether an entry retires after its first invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// Fires at most once, then is removed from the wrapper.
    OneShot,
    /// Fires on every matching emission.
    Continuous,
}

/// Which statuses an entry listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    Any,
    Only(Status),
}

impl StatusFilter {
    #[must_use]
    pub const fn matches(self, status: Status) -> bool {
        match self {
            Self::Any => true,
            Self::Only(wanted) => wanted as u8 == status as u8,
        }
    }
}

impl From<Status> for StatusFilter {
    fn from(status: Status) -> Self {
        Self::Only(status)
    }
}

type Handler<T> = Box<dyn FnMut(&DataResult<T>) -> HandlerResult + Send>;
type Predicate<T> = Box<dyn Fn(&DataResult<T>) -> bool + Send>;

/// One registration: status filter, optional predicate, handler, delivery.
///
/// Owned by exactly one [`EventWrapper`](super::EventWrapper).
pub struct EventEntry<T> {
    filter: StatusFilter,
    predicate: Option<Predicate<T>>,
    handler: Handler<T>,
    delivery: Delivery,
}

impl<T> EventEntry<T> {
    /// Entry receiving the whole emission.
    pub fn new<F>(filter: impl Into<StatusFilter>, delivery: Delivery, handler: F) -> Self
    where
        F: FnMut(&DataResult<T>) -> HandlerResult + Send + 'static,
    {
        Self {
            filter: filter.into(),
            predicate: None,
            handler: Box::new(handler),
            delivery,
        }
    }

    /// Only fire when `predicate` also holds for the emission.
    ///
    /// Calling this again combines both predicates.
    #[must_use]
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&DataResult<T>) -> bool + Send + 'static,
        T: 'static,
    {
        let combined: Predicate<T> = match self.predicate.take() {
            Some(existing) => Box::new(move |r: &DataResult<T>| existing(r) && predicate(r)),
            None => Box::new(predicate),
        };
        self.predicate = Some(combined);
        self
    }

    #[must_use]
    pub const fn filter(&self) -> StatusFilter {
        self.filter
    }

    #[must_use]
    pub const fn delivery(&self) -> Delivery {
        self.delivery
    }

    #[must_use]
    pub const fn is_one_shot(&self) -> bool {
        matches!(self.delivery, Delivery::OneShot)
    }

    /// Status filter and predicate both accept the emission.
    #[must_use]
    pub fn matches(&self, emission: &DataResult<T>) -> bool {
        self.filter.matches(emission.status()) && self.predicate.as_ref().map_or(true, |p| p(emission))
    }

    /// Invoke the handler. With `catch_panics`, a panic is returned as a
    /// [`PanicError`] instead of unwinding into the caller.
    pub(crate) fn invoke(&mut self, emission: &DataResult<T>, catch_panics: bool) -> HandlerResult {
        if !catch_panics {
            return (self.handler)(emission);
        }

        let handler = &mut self.handler;
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(emission))) {
            Ok(outcome) => outcome,
            Err(payload) => Err(Box::new(PanicError::from_payload(payload.as_ref()))),
        }
    }
}

impl<T> fmt::Debug for EventEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEntry")
            .field("filter", &self.filter)
            .field("has_predicate", &self.predicate.is_some())
            .field("delivery", &self.delivery)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_status() {
        assert!(StatusFilter::Any.matches(Status::Error));
        assert!(StatusFilter::Only(Status::Loading).matches(Status::Loading));
        assert!(!StatusFilter::Only(Status::Loading).matches(Status::Success));
    }

    #[test]
    fn predicates_combine() {
        let entry = EventEntry::new(StatusFilter::Any, Delivery::Continuous, |_: &DataResult<i32>| Ok(()))
            .when(|r| r.data().is_some())
            .when(|r| r.data().is_some_and(|v| *v > 10));
        assert!(entry.matches(&DataResult::success(11)));
        assert!(!entry.matches(&DataResult::success(3)));
        assert!(!entry.matches(&DataResult::empty()));
    }

    #[test]
    fn invoke_catches_panics_when_asked() {
        let mut entry = EventEntry::new(Status::Success, Delivery::OneShot, |_: &DataResult<i32>| panic!("handler blew up"));
        let err = entry.invoke(&DataResult::success(1), true).unwrap_err();
        assert!(err.to_string().contains("handler blew up"));
    }

    #[test]
    fn invoke_returns_handler_error() {
        let mut entry = EventEntry::new(Status::Error, Delivery::Continuous, |_: &DataResult<i32>| Err("refused".into()));
        let err = entry.invoke(&DataResult::error(crate::result::ErrorValue::msg("x"), None), true).unwrap_err();
        assert_eq!(err.to_string(), "refused");
        assert!(!entry.is_one_shot());
    }
}
