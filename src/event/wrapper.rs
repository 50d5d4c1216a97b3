//! Ordered handler registry evaluated once per delivered emission.

use std::sync::Arc;

use crate::error::{DataResultError, HandlerResult};
use crate::result::{DataResult, ErrorValue, Status};

use super::entry::{Delivery, EventEntry, StatusFilter};
use super::sink::{ErrorSink, FaultReport};

/// What one evaluation did.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    /// Handlers invoked (successful or not).
    pub fired: usize,
    /// One-shot entries removed by this evaluation.
    pub retired: usize,
    /// Wrapped handler failures, in invocation order.
    pub failures: Vec<Arc<DataResultError>>,
    /// No entries remain; the owning bridge should release its subscription.
    pub inert: bool,
}

/// Builder-style registry of event entries.
///
/// Loading and error handlers default to continuous delivery, success and
/// empty handlers to one-shot. The `*_with` variants take an explicit
/// [`Delivery`].
///
/// # Example
/// ```rust,ignore
/// let wrapper = EventWrapper::new()
///     .on_loading(|stale| { show_spinner(stale); Ok(()) })
///     .on_success(|profile| { render(profile); Ok(()) })
///     .on_error(|err| { toast(err); Ok(()) });
/// ```
pub struct EventWrapper<T> {
    entries: Vec<EventEntry<T>>,
}

impl<T> Default for EventWrapper<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> std::fmt::Debug for EventWrapper<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventWrapper").field("entries", &self.entries).finish()
    }
}

impl<T: 'static> EventWrapper<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    #[must_use]
    pub fn register(mut self, entry: EventEntry<T>) -> Self {
        self.entries.push(entry);
        self
    }

    /// Continuous loading handler; receives the stale data, if any.
    #[must_use]
    pub fn on_loading<F>(self, handler: F) -> Self
    where
        F: FnMut(Option<&T>) -> HandlerResult + Send + 'static,
    {
        self.on_loading_with(Delivery::Continuous, handler)
    }

    #[must_use]
    pub fn on_loading_with<F>(self, delivery: Delivery, mut handler: F) -> Self
    where
        F: FnMut(Option<&T>) -> HandlerResult + Send + 'static,
    {
        self.register(EventEntry::new(Status::Loading, delivery, move |r: &DataResult<T>| {
            handler(r.data())
        }))
    }

    /// One-shot success handler; fires only when the emission carries data.
    #[must_use]
    pub fn on_success<F>(self, handler: F) -> Self
    where
        F: FnMut(&T) -> HandlerResult + Send + 'static,
    {
        self.on_success_with(Delivery::OneShot, handler)
    }

    #[must_use]
    pub fn on_success_with<F>(self, delivery: Delivery, mut handler: F) -> Self
    where
        F: FnMut(&T) -> HandlerResult + Send + 'static,
    {
        let entry = EventEntry::new(Status::Success, delivery, move |r: &DataResult<T>| match r.data() {
            Some(data) => handler(data),
            None => Ok(()),
        })
        .when(|r| r.data().is_some());
        self.register(entry)
    }

    /// Continuous error handler.
    #[must_use]
    pub fn on_error<F>(self, handler: F) -> Self
    where
        F: FnMut(&ErrorValue) -> HandlerResult + Send + 'static,
    {
        self.on_error_with(Delivery::Continuous, handler)
    }

    #[must_use]
    pub fn on_error_with<F>(self, delivery: Delivery, mut handler: F) -> Self
    where
        F: FnMut(&ErrorValue) -> HandlerResult + Send + 'static,
    {
        self.register(EventEntry::new(Status::Error, delivery, move |r: &DataResult<T>| {
            match r.error_value() {
                Some(err) => handler(err),
                None => Ok(()),
            }
        }))
    }

    /// One-shot handler for a success without data.
    #[must_use]
    pub fn on_empty<F>(self, handler: F) -> Self
    where
        F: FnMut() -> HandlerResult + Send + 'static,
    {
        self.on_empty_with(Delivery::OneShot, handler)
    }

    #[must_use]
    pub fn on_empty_with<F>(self, delivery: Delivery, mut handler: F) -> Self
    where
        F: FnMut() -> HandlerResult + Send + 'static,
    {
        let entry = EventEntry::new(Status::Success, delivery, move |_: &DataResult<T>| handler())
            .when(DataResult::is_empty);
        self.register(entry)
    }

    /// Continuous handler for every emission regardless of status.
    #[must_use]
    pub fn observe<F>(self, handler: F) -> Self
    where
        F: FnMut(&DataResult<T>) -> HandlerResult + Send + 'static,
    {
        self.observe_with(Delivery::Continuous, handler)
    }

    #[must_use]
    pub fn observe_with<F>(self, delivery: Delivery, handler: F) -> Self
    where
        F: FnMut(&DataResult<T>) -> HandlerResult + Send + 'static,
    {
        self.register(EventEntry::new(StatusFilter::Any, delivery, handler))
    }
}

impl<T> EventWrapper<T> {
    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry has retired (or none was registered).
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluate one emission, isolating handler panics.
    pub fn dispatch(&mut self, emission: &DataResult<T>, sink: &dyn ErrorSink) -> DispatchOutcome {
        self.evaluate(emission, sink, true, &|| false)
    }

    /// Evaluate one emission against the entries, in registration order.
    ///
    /// Every matching handler runs even if an earlier one failed. Failures
    /// are wrapped as `DataResultError::Handler` and reported to `sink`.
    /// One-shot entries are removed right after their invocation, whether or
    /// not the handler succeeded. `stopped` is checked before each entry;
    /// once it holds, the remaining entries are skipped.
    pub(crate) fn evaluate(
        &mut self,
        emission: &DataResult<T>,
        sink: &dyn ErrorSink,
        catch_panics: bool,
        stopped: &dyn Fn() -> bool,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        let mut index = 0;
        while index < self.entries.len() {
            if stopped() {
                break;
            }
            let entry = &mut self.entries[index];
            if !entry.matches(emission) {
                index += 1;
                continue;
            }

            outcome.fired += 1;
            if let Err(cause) = entry.invoke(emission, catch_panics) {
                let error = Arc::new(DataResultError::handler(emission.status(), cause));
                sink.report(FaultReport::new(Arc::clone(&error), emission.status()));
                outcome.failures.push(error);
            }

            if entry.is_one_shot() {
                self.entries.remove(index);
                outcome.retired += 1;
            } else {
                index += 1;
            }
        }

        outcome.inert = self.entries.is_empty();
        outcome
    }
}
