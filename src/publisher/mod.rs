//! Publishers: push-based sources that replay their latest value.
//!
//! Every adapter implements the same [`Publisher`] contract:
//!
//! - `subscribe` registers a callback and delivers the latest value (if any)
//!   to it right away.
//! - `replay` delivers the latest value again to one subscription, used when
//!   a previously gated subscriber becomes active.
//! - `unsubscribe` releases a subscription; unknown ids are ignored.
//! - A subscription whose [`CancellationToken`] is cancelled receives nothing
//!   further.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bridge::CancellationToken;
use crate::error::FlowResult;
use crate::result::DataResult;

/// Worker-thread publisher fed through bounded channels.
pub mod channel;
/// Publisher adapter applying a transform stage to every emission.
pub mod mapped;
/// In-memory state holder.
pub mod state;
/// `tokio::sync::watch` adapter.
#[cfg(feature = "tokio")]
pub mod watch;

pub use channel::{ChannelPublisher, ChannelPublisherConfig};
pub use mapped::MappedPublisher;
pub use state::StatePublisher;
#[cfg(feature = "tokio")]
pub use watch::WatchPublisher;

/// Unique identifier for a subscription.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Callback receiving emissions.
pub type Subscriber<T> = Arc<dyn Fn(&DataResult<T>) + Send + Sync>;

/// A push-based, replay-last-value source of [`DataResult`] emissions.
pub trait Publisher<T>: Send + Sync {
    /// Register `subscriber`; the latest value, if any, is delivered to it
    /// immediately (possibly on the publisher's delivery context).
    fn subscribe(&self, subscriber: Subscriber<T>, token: CancellationToken) -> FlowResult<SubscriptionId>;

    /// Release a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Deliver the latest value again to one subscription.
    fn replay(&self, id: SubscriptionId);

    /// The latest value, if any has been emitted.
    fn latest(&self) -> Option<DataResult<T>>;
}

/// Accepts emissions from producers.
pub trait Emitter<T>: Send + Sync {
    /// Publish a new emission.
    fn emit(&self, value: DataResult<T>) -> FlowResult<()>;

    /// Data of the latest emission, used to keep stale data while reloading.
    fn current_data(&self) -> Option<T>;
}

/// Adapters over any publisher.
pub trait PublisherExt<T>: Publisher<T> {
    /// Apply a transform stage to every emission, including replays.
    ///
    /// ```rust,ignore
    /// let doubled = publisher.clone().map_results(|r| r.map(|x| x * 2));
    /// ```
    fn map_results<R, F>(self: Arc<Self>, stage: F) -> MappedPublisher<T, R>
    where
        Self: Sized + 'static,
        T: Clone + Send + Sync + 'static,
        F: Fn(DataResult<T>) -> DataResult<R> + Send + Sync + 'static,
    {
        MappedPublisher::new(self, stage)
    }
}

impl<T, P> PublisherExt<T> for P where P: Publisher<T> + ?Sized {}
