//! Event registration and evaluation.
//!
//! An [`EventWrapper`] holds an ordered list of [`EventEntry`] registrations.
//! Each delivered emission is evaluated against every entry in order; one-shot
//! entries retire after they fire, and a wrapper with no entries left is
//! inert. Handler failures are isolated per entry and reported to an
//! [`ErrorSink`].

/// Entry definitions (filter, predicate, delivery).
pub mod entry;
/// Error sinks for isolated handler failures.
pub mod sink;
/// The ordered registry and its evaluation loop.
pub mod wrapper;

pub use entry::{Delivery, EventEntry, StatusFilter};
pub use sink::{CollectingSink, ErrorSink, FaultReport, UnhandledFaultSink};
pub use wrapper::{DispatchOutcome, EventWrapper};
