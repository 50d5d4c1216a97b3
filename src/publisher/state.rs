//! In-memory state holder publishing on the emitting thread.
//!
//! Deliveries are serialized through a drain queue: whichever thread finds
//! the queue idle drains it, later emitters only enqueue. A handler that
//! emits into the same publisher therefore never re-enters evaluation; its
//! emission is delivered after the current one completes.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::bridge::CancellationToken;
use crate::error::{BridgeError, FlowError, FlowResult};
use crate::result::DataResult;

use super::{Emitter, Publisher, Subscriber, SubscriptionId};

struct SubscriberEntry<T> {
    id: SubscriptionId,
    subscriber: Subscriber<T>,
    token: CancellationToken,
}

enum Pending<T> {
    Broadcast(DataResult<T>),
    Replay(SubscriptionId, DataResult<T>),
}

struct StateInner<T> {
    latest: Option<DataResult<T>>,
    subscribers: Vec<SubscriberEntry<T>>,
    pending: VecDeque<Pending<T>>,
    draining: bool,
    closed: bool,
}

/// Replay-last-value state holder.
pub struct StatePublisher<T> {
    inner: Mutex<StateInner<T>>,
}

impl<T> std::fmt::Debug for StatePublisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("StatePublisher");
        if let Ok(inner) = self.inner.lock() {
            s.field("subscribers", &inner.subscribers.len())
                .field("pending", &inner.pending.len())
                .field("closed", &inner.closed);
        }
        s.finish_non_exhaustive()
    }
}

impl<T> Default for StatePublisher<T> {
    fn default() -> Self {
        Self::from_latest(None)
    }
}

fn lock_err() -> FlowError {
    FlowError::internal("poisoned lock: state publisher")
}

impl<T> StatePublisher<T> {
    /// A publisher with no value yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A publisher already holding `initial`.
    #[must_use]
    pub fn with_value(initial: DataResult<T>) -> Self {
        Self::from_latest(Some(initial))
    }

    fn from_latest(latest: Option<DataResult<T>>) -> Self {
        Self {
            inner: Mutex::new(StateInner {
                latest,
                subscribers: Vec::new(),
                pending: VecDeque::new(),
                draining: false,
                closed: false,
            }),
        }
    }

    fn lock(&self) -> FlowResult<MutexGuard<'_, StateInner<T>>> {
        self.inner.lock().map_err(|_| lock_err())
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.subscribers.len()).unwrap_or_default()
    }

    /// Stop accepting emissions and drop every subscription.
    pub fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed = true;
            inner.subscribers.clear();
            inner.pending.clear();
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().map_or(true, |inner| inner.closed)
    }
}

impl<T: Clone> StatePublisher<T> {
    /// Store `value` as the latest emission and deliver it to every
    /// subscriber.
    pub fn emit(&self, value: DataResult<T>) -> FlowResult<()> {
        {
            let mut inner = self.lock()?;
            if inner.closed {
                return Err(closed().into());
            }
            inner.latest = Some(value.clone());
            inner.pending.push_back(Pending::Broadcast(value));
            if inner.draining {
                return Ok(());
            }
            inner.draining = true;
        }
        self.drain();
        Ok(())
    }

    fn enqueue_replay(&self, id: SubscriptionId) {
        {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            let Some(latest) = inner.latest.clone() else {
                return;
            };
            if !inner.subscribers.iter().any(|s| s.id == id) {
                return;
            }
            inner.pending.push_back(Pending::Replay(id, latest));
            if inner.draining {
                return;
            }
            inner.draining = true;
        }
        self.drain();
    }

    /// Deliver queued emissions until the queue is empty. Callbacks run
    /// without the lock held.
    fn drain(&self) {
        let _reset = DrainReset(&self.inner);
        loop {
            let (value, targets) = {
                let Ok(mut inner) = self.inner.lock() else {
                    return;
                };
                let Some(job) = inner.pending.pop_front() else {
                    inner.draining = false;
                    return;
                };
                match job {
                    Pending::Broadcast(value) => {
                        let targets: Vec<_> = inner
                            .subscribers
                            .iter()
                            .map(|s| (s.subscriber.clone(), s.token.clone()))
                            .collect();
                        (value, targets)
                    }
                    Pending::Replay(id, value) => {
                        let targets: Vec<_> = inner
                            .subscribers
                            .iter()
                            .filter(|s| s.id == id)
                            .map(|s| (s.subscriber.clone(), s.token.clone()))
                            .collect();
                        (value, targets)
                    }
                }
            };

            for (subscriber, token) in targets {
                if !token.is_cancelled() {
                    subscriber(&value);
                }
            }
        }
    }
}

/// Clears the draining flag if a subscriber unwinds out of a drain.
struct DrainReset<'a, T>(&'a Mutex<StateInner<T>>);

impl<T> Drop for DrainReset<'_, T> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        if let Ok(mut inner) = self.0.lock() {
            inner.draining = false;
        }
    }
}

fn closed() -> BridgeError {
    BridgeError::PublisherClosed {
        path: "state_publisher".to_string(),
    }
}

impl<T> Publisher<T> for StatePublisher<T>
where
    T: Clone + Send + Sync,
{
    fn subscribe(&self, subscriber: Subscriber<T>, token: CancellationToken) -> FlowResult<SubscriptionId> {
        let id = SubscriptionId::new();
        {
            let mut inner = self.lock()?;
            if inner.closed {
                return Err(closed().into());
            }
            inner.subscribers.push(SubscriberEntry { id, subscriber, token });
        }
        self.enqueue_replay(id);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscribers.retain(|s| s.id != id);
        }
    }

    fn replay(&self, id: SubscriptionId) {
        self.enqueue_replay(id);
    }

    fn latest(&self) -> Option<DataResult<T>> {
        self.inner.lock().ok().and_then(|inner| inner.latest.clone())
    }
}

impl<T> Emitter<T> for StatePublisher<T>
where
    T: Clone + Send + Sync,
{
    fn emit(&self, value: DataResult<T>) -> FlowResult<()> {
        StatePublisher::emit(self, value)
    }

    fn current_data(&self) -> Option<T> {
        self.latest().and_then(DataResult::into_data)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<DataResult<i32>>>>, Subscriber<i32>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let subscriber: Subscriber<i32> = Arc::new(move |r: &DataResult<i32>| s.lock().unwrap().push(r.clone()));
        (seen, subscriber)
    }

    #[test]
    fn subscribe_replays_latest() {
        let publisher = StatePublisher::with_value(DataResult::success(1));
        let (seen, subscriber) = recorder();
        publisher.subscribe(subscriber, CancellationToken::new()).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![DataResult::success(1)]);
    }

    #[test]
    fn subscribe_without_value_delivers_nothing() {
        let publisher = StatePublisher::<i32>::new();
        let (seen, subscriber) = recorder();
        publisher.subscribe(subscriber, CancellationToken::new()).unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn emit_broadcasts_in_order() {
        let publisher = StatePublisher::new();
        let (seen, subscriber) = recorder();
        publisher.subscribe(subscriber, CancellationToken::new()).unwrap();
        publisher.emit(DataResult::loading(None)).unwrap();
        publisher.emit(DataResult::success(2)).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![DataResult::loading(None), DataResult::success(2)]
        );
        assert_eq!(publisher.latest(), Some(DataResult::success(2)));
    }

    #[test]
    fn replay_targets_one_subscription() {
        let publisher = StatePublisher::with_value(DataResult::success(5));
        let (first, a) = recorder();
        let (second, b) = recorder();
        let id = publisher.subscribe(a, CancellationToken::new()).unwrap();
        publisher.subscribe(b, CancellationToken::new()).unwrap();

        publisher.replay(id);
        assert_eq!(first.lock().unwrap().len(), 2);
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn cancelled_token_stops_delivery() {
        let publisher = StatePublisher::new();
        let (seen, subscriber) = recorder();
        let token = CancellationToken::new();
        publisher.subscribe(subscriber, token.clone()).unwrap();
        token.cancel();
        publisher.emit(DataResult::success(1)).unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let publisher = StatePublisher::<i32>::new();
        let (_, subscriber) = recorder();
        let id = publisher.subscribe(subscriber, CancellationToken::new()).unwrap();
        assert_eq!(publisher.subscriber_count(), 1);
        publisher.unsubscribe(id);
        publisher.unsubscribe(id);
        publisher.unsubscribe(SubscriptionId::new());
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn reentrant_emit_is_delivered_after_current() {
        let publisher = Arc::new(StatePublisher::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let p = Arc::clone(&publisher);
        let o = Arc::clone(&order);
        let subscriber: Subscriber<i32> = Arc::new(move |r: &DataResult<i32>| {
            let v = *r.data().unwrap();
            o.lock().unwrap().push(format!("start {v}"));
            if v == 1 {
                p.emit(DataResult::success(2)).unwrap();
            }
            o.lock().unwrap().push(format!("end {v}"));
        });
        publisher.subscribe(subscriber, CancellationToken::new()).unwrap();
        publisher.emit(DataResult::success(1)).unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["start 1", "end 1", "start 2", "end 2"]);
    }

    #[test]
    fn closed_publisher_rejects_emissions() {
        let publisher = StatePublisher::<i32>::new();
        publisher.close();
        assert!(publisher.is_closed());
        let err = publisher.emit(DataResult::success(1)).unwrap_err();
        assert!(err.is_bridge());
        let (_, subscriber) = recorder();
        assert!(publisher.subscribe(subscriber, CancellationToken::new()).is_err());
    }

    #[test]
    fn emitter_exposes_current_data() {
        let publisher = StatePublisher::with_value(DataResult::success(9));
        assert_eq!(Emitter::current_data(&publisher), Some(9));
    }
}
