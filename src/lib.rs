//! # resultflow - Status-driven result propagation
//!
//! resultflow carries the state of an asynchronous operation (loading,
//! success or error) from a producer to lifecycle-bound consumers. Handlers
//! are registered per status on an [`EventWrapper`] and fire either once or on
//! every matching emission; a [`Bridge`] connects the wrapper to a
//! [`Publisher`] and only dispatches while its [`LifecycleGate`] is active.
//!
//! ## Core Concepts
//!
//! - **DataResult**: Immutable container of status, optional data and optional error
//! - **Transform stages**: `map` / `map_error` operators that turn failures into error emissions
//! - **EventWrapper**: Ordered registry of one-shot and continuous handlers
//! - **Bridge**: Publisher + gate binding with automatic detach once every handler retired
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use resultflow::{Bridge, DataResult, EventWrapper, FlowContext, Lifecycle, StatePublisher};
//!
//! let profile = Arc::new(StatePublisher::new());
//! let lifecycle = Lifecycle::active();
//!
//! let wrapper = EventWrapper::new()
//!     .on_loading(|_stale| { println!("loading"); Ok(()) })
//!     .on_success(|name: &String| { println!("hello {name}"); Ok(()) })
//!     .on_error(|err| { eprintln!("{err}"); Ok(()) });
//!
//! let bridge = Bridge::new(wrapper, FlowContext::default());
//! bridge.attach(profile.clone(), lifecycle.clone())?;
//!
//! profile.emit(DataResult::loading(None))?;
//! profile.emit(DataResult::success("Ada".to_string()))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod event;
pub mod result;

// Delivery
pub mod bridge;
pub mod publisher;
pub mod task;

// Ambient
pub mod config;
pub mod context;
pub mod observability;

// Re-export primary types at crate root for convenience
pub use bridge::{AlwaysActive, Bridge, BridgePhase, CancellationToken, Lifecycle, LifecycleGate};
pub use config::{ChannelConfig, FlowConfig};
pub use context::FlowContext;
pub use error::{
    BoxError, BridgeError, ConfigError, DataResultError, FlowError, FlowResult, HandlerResult, PanicError,
    ValidationError,
};
pub use event::{
    CollectingSink, Delivery, DispatchOutcome, ErrorSink, EventEntry, EventWrapper, FaultReport, StatusFilter,
    UnhandledFaultSink,
};
pub use observability::{LogRegistry, LoggingGuard};
pub use publisher::{
    ChannelPublisher, Emitter, MappedPublisher, Publisher, PublisherExt, StatePublisher, Subscriber, SubscriptionId,
};
#[cfg(feature = "tokio")]
pub use publisher::WatchPublisher;
pub use result::{DataResult, ErrorValue, Status};
pub use task::{ResultTask, TaskHandle};
