//! The bridge binding an [`EventWrapper`] to a publisher and a gate.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};

use crate::context::FlowContext;
use crate::error::{BridgeError, FlowResult};
use crate::event::sink::OriginSink;
use crate::event::EventWrapper;
use crate::publisher::{Publisher, Subscriber, SubscriptionId};
use crate::result::DataResult;

use super::cancel::CancellationToken;
use super::gate::{LifecycleEvent, LifecycleGate};

/// Where a bridge is in its attach/detach lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgePhase {
    /// Created, not yet subscribed.
    Unattached,
    /// Subscribed; emissions are evaluated while the gate is active.
    Attached,
    /// Terminal; the subscription has been released.
    Detached,
}

impl BridgePhase {
    fn ensure_unattached(self) -> FlowResult<()> {
        match self {
            Self::Unattached => Ok(()),
            Self::Attached => Err(BridgeError::AlreadyAttached.into()),
            Self::Detached => Err(BridgeError::Detached.into()),
        }
    }
}

struct Link<T> {
    phase: BridgePhase,
    publisher: Option<Weak<dyn Publisher<T>>>,
    subscription: Option<SubscriptionId>,
}

struct BridgeShared<T> {
    ctx: FlowContext,
    wrapper: Mutex<EventWrapper<T>>,
    link: Mutex<Link<T>>,
    token: CancellationToken,
}

/// Connects one publisher and one lifecycle gate to an [`EventWrapper`].
///
/// The wrapper is moved into the bridge, so no entries can be registered
/// after attach. Each delivered emission samples the gate: inactive gates
/// drop it, active gates evaluate it against the wrapper. Once every entry
/// has retired, the bridge releases its subscription after the dispatch that
/// emptied the wrapper completes.
///
/// A publisher holds the bridge alive while subscribed; the bridge only
/// holds the publisher weakly.
///
/// # Example
/// ```rust,ignore
/// let bridge = Bridge::new(wrapper, FlowContext::default());
/// bridge.attach(publisher.clone(), lifecycle.clone())?;
/// // ...
/// bridge.detach();
/// ```
pub struct Bridge<T> {
    shared: Arc<BridgeShared<T>>,
}

impl<T> Clone for Bridge<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for Bridge<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("phase", &self.phase())
            .field("subscription", &self.subscription_id())
            .finish_non_exhaustive()
    }
}

impl<T: 'static> Bridge<T> {
    #[must_use]
    pub fn new(wrapper: EventWrapper<T>, ctx: FlowContext) -> Self {
        Self {
            shared: Arc::new(BridgeShared {
                ctx,
                wrapper: Mutex::new(wrapper),
                link: Mutex::new(Link {
                    phase: BridgePhase::Unattached,
                    publisher: None,
                    subscription: None,
                }),
                token: CancellationToken::new(),
            }),
        }
    }

    /// Subscribe to `publisher`, dispatching while `gate` is active.
    ///
    /// The publisher's latest value (if any) is delivered during this call.
    /// An inert wrapper detaches immediately without subscribing.
    ///
    /// # Errors
    /// `BridgeError::AlreadyAttached` or `BridgeError::Detached` when the
    /// bridge is not `Unattached`; any error from `Publisher::subscribe`
    /// (the bridge then stays `Unattached`).
    pub fn attach<G>(&self, publisher: Arc<dyn Publisher<T>>, gate: G) -> FlowResult<()>
    where
        G: LifecycleGate + 'static,
    {
        let shared = &self.shared;
        // Phase first: a handler attaching its own bridge already holds the
        // wrapper lock.
        shared.link().phase.ensure_unattached()?;
        let inert = shared.wrapper.lock().map_or(true, |w| w.is_inert());

        {
            let mut link = shared.link();
            link.phase.ensure_unattached()?;
            if inert {
                link.phase = BridgePhase::Detached;
                drop(link);
                shared.token.cancel();
                shared.ctx.in_scope(|| tracing::debug!("bridge attached with no entries; detached"));
                return Ok(());
            }
            link.phase = BridgePhase::Attached;
            link.publisher = Some(Arc::downgrade(&publisher));
        }

        let gate = Arc::new(gate);
        let delivering = Arc::clone(shared);
        let sampled = Arc::clone(&gate);
        let subscriber: Subscriber<T> = Arc::new(move |emission: &DataResult<T>| {
            delivering.deliver(emission, sampled.as_ref());
        });

        let id = match publisher.subscribe(subscriber, shared.token.clone()) {
            Ok(id) => id,
            Err(err) => {
                let mut link = shared.link();
                if link.phase == BridgePhase::Attached {
                    link.phase = BridgePhase::Unattached;
                    link.publisher = None;
                }
                return Err(err);
            }
        };

        // The replay during subscribe may already have emptied the wrapper,
        // or a concurrent detach may have run; both leave the phase Detached.
        let released = {
            let mut link = shared.link();
            if link.phase == BridgePhase::Detached {
                true
            } else {
                link.subscription = Some(id);
                false
            }
        };
        if released {
            publisher.unsubscribe(id);
            shared.ctx.in_scope(|| tracing::debug!(subscription = %id, "bridge released during attach"));
            return Ok(());
        }

        shared.ctx.in_scope(|| tracing::debug!(subscription = %id, "bridge attached"));

        let weak = Arc::downgrade(shared);
        gate.on_lifecycle(Box::new(move |event| {
            let Some(shared) = weak.upgrade() else {
                return false;
            };
            match event {
                LifecycleEvent::Activated => {
                    shared.resume();
                    !shared.token.is_cancelled()
                }
                LifecycleEvent::Destroyed => {
                    shared.release("lifecycle destroyed");
                    false
                }
            }
        }));

        Ok(())
    }
}

impl<T> Bridge<T> {
    /// Stop all future handler invocations and release the subscription.
    ///
    /// Idempotent. Has no effect on a bridge that was never attached; it can
    /// still be attached afterwards.
    pub fn detach(&self) {
        self.shared.release("detached");
    }

    /// Ask the publisher to redeliver its latest value to this bridge.
    /// No-op unless attached.
    pub fn resume(&self) {
        self.shared.resume();
    }

    #[must_use]
    pub fn phase(&self) -> BridgePhase {
        self.shared.link().phase
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.phase() == BridgePhase::Attached
    }

    /// Detached and no subscription is held.
    #[must_use]
    pub fn is_released(&self) -> bool {
        let link = self.shared.link();
        link.phase == BridgePhase::Detached && link.subscription.is_none()
    }

    #[must_use]
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.shared.link().subscription
    }

    /// Live entries left in the wrapper.
    #[must_use]
    pub fn pending_entries(&self) -> usize {
        self.shared.wrapper.lock().map(|w| w.len()).unwrap_or_default()
    }
}

impl<T> BridgeShared<T> {
    fn link(&self) -> MutexGuard<'_, Link<T>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, emission: &DataResult<T>, gate: &dyn LifecycleGate) {
        if self.token.is_cancelled() {
            return;
        }
        if !gate.is_active() {
            self.ctx
                .in_scope(|| tracing::trace!(status = %emission.status(), "gate inactive; emission dropped"));
            return;
        }

        let origin = self.link().subscription;
        let inert = self.ctx.in_scope(|| {
            // A handler that panicked with panic isolation off poisons the
            // wrapper; nothing can be evaluated after that.
            let Ok(mut wrapper) = self.wrapper.lock() else {
                return true;
            };
            if self.token.is_cancelled() {
                return false;
            }
            let sink = OriginSink {
                inner: self.ctx.error_sink(),
                origin,
            };
            let outcome = wrapper.evaluate(
                emission,
                &sink,
                self.ctx.config().catch_handler_panics,
                &|| self.token.is_cancelled(),
            );
            if !outcome.failures.is_empty() {
                tracing::debug!(
                    status = %emission.status(),
                    failures = outcome.failures.len(),
                    "handler faults isolated"
                );
            }
            outcome.inert
        });

        if inert {
            self.release("wrapper inert");
        }
    }

    fn resume(&self) {
        let target = {
            let link = self.link();
            if link.phase != BridgePhase::Attached {
                return;
            }
            link.publisher
                .as_ref()
                .and_then(Weak::upgrade)
                .zip(link.subscription)
        };
        if let Some((publisher, id)) = target {
            publisher.replay(id);
        }
    }

    fn release(&self, reason: &'static str) {
        let (publisher, subscription) = {
            let mut link = self.link();
            if link.phase != BridgePhase::Attached {
                return;
            }
            link.phase = BridgePhase::Detached;
            self.token.cancel();
            (link.publisher.take(), link.subscription.take())
        };

        if let (Some(publisher), Some(id)) = (publisher.as_ref().and_then(Weak::upgrade), subscription) {
            publisher.unsubscribe(id);
        }
        self.ctx
            .in_scope(|| tracing::debug!(reason, subscription = ?subscription, "bridge detached"));
    }
}
