//! Lifecycle-aware dispatch.
//!
//! A [`Bridge`] subscribes an [`EventWrapper`](crate::event::EventWrapper) to
//! a [`Publisher`](crate::publisher::Publisher) and samples a
//! [`LifecycleGate`] before every evaluation. Emissions arriving while the
//! gate is inactive are dropped; the publisher's replay-last-value contract
//! delivers the latest state again once the gate reopens.

/// Cooperative cancellation shared with publishers.
pub mod cancel;
/// The bridge itself.
pub mod dispatcher;
/// Liveness gates.
pub mod gate;

pub use cancel::CancellationToken;
pub use dispatcher::{Bridge, BridgePhase};
pub use gate::{AlwaysActive, Lifecycle, LifecycleEvent, LifecycleGate, LifecycleListener, LifecycleState};
