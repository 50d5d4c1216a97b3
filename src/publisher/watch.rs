//! Publisher adapter over a `tokio::sync::watch` channel.
//!
//! Each subscription runs as a task on the supplied runtime. The task delivers
//! the current value first, then every change, and re-delivers the current
//! value when a replay is requested.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::bridge::CancellationToken;
use crate::error::{FlowError, FlowResult};
use crate::result::DataResult;

use super::{Emitter, Publisher, Subscriber, SubscriptionId};

struct SubscriptionTask {
    join: JoinHandle<()>,
    replay: Arc<Notify>,
}

/// Publisher backed by a `watch` receiver.
pub struct WatchPublisher<T> {
    rx: watch::Receiver<DataResult<T>>,
    tx: Option<watch::Sender<DataResult<T>>>,
    handle: Handle,
    tasks: Mutex<HashMap<SubscriptionId, SubscriptionTask>>,
}

impl<T> std::fmt::Debug for WatchPublisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchPublisher")
            .field("subscriptions", &self.tasks.lock().map(|t| t.len()).unwrap_or_default())
            .finish_non_exhaustive()
    }
}

impl<T> WatchPublisher<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Observe an existing watch channel; emissions come from its sender.
    #[must_use]
    pub fn from_receiver(rx: watch::Receiver<DataResult<T>>, handle: Handle) -> Self {
        Self {
            rx,
            tx: None,
            handle,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Create a channel holding `initial` and own its sender, so the
    /// publisher can also be used as an [`Emitter`].
    #[must_use]
    pub fn new(initial: DataResult<T>, handle: Handle) -> Self {
        let (tx, rx) = watch::channel(initial);
        Self {
            rx,
            tx: Some(tx),
            handle,
            tasks: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Publisher<T> for WatchPublisher<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Subscriber<T>, token: CancellationToken) -> FlowResult<SubscriptionId> {
        let id = SubscriptionId::new();
        let mut rx = self.rx.clone();
        let replay = Arc::new(Notify::new());
        let replay_rx = Arc::clone(&replay);

        let join = self.handle.spawn(async move {
            loop {
                if token.is_cancelled() {
                    break;
                }
                // Clone out of the borrow so the channel is not locked while
                // handlers run.
                let value = rx.borrow_and_update().clone();
                subscriber(&value);

                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    () = replay_rx.notified() => {}
                }
            }
        });

        self.tasks
            .lock()
            .map_err(|_| FlowError::internal("poisoned lock: watch publisher"))?
            .insert(id, SubscriptionTask { join, replay });
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.remove(&id) {
                task.join.abort();
            }
        }
    }

    fn replay(&self, id: SubscriptionId) {
        if let Ok(tasks) = self.tasks.lock() {
            if let Some(task) = tasks.get(&id) {
                task.replay.notify_one();
            }
        }
    }

    fn latest(&self) -> Option<DataResult<T>> {
        Some(self.rx.borrow().clone())
    }
}

impl<T> Emitter<T> for WatchPublisher<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn emit(&self, value: DataResult<T>) -> FlowResult<()> {
        let Some(tx) = &self.tx else {
            return Err(FlowError::internal("watch publisher was built from a receiver; emit through its sender"));
        };
        tx.send_replace(value);
        Ok(())
    }

    fn current_data(&self) -> Option<T> {
        self.rx.borrow().data().cloned()
    }
}

impl<T> Drop for WatchPublisher<T> {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for (_, task) in tasks.drain() {
                task.join.abort();
            }
        }
    }
}
