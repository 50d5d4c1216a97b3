//! Worker-thread publisher.
//!
//! Emissions are enqueued with non-blocking `try_send` and delivered to
//! subscribers on a dedicated worker thread, in emission order. A full queue
//! sheds its oldest emission, so the newest value always reaches the worker.
//! The worker owns the subscriber list and the latest value; the emitting
//! side keeps a mirror of the latest value for [`Publisher::latest`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use serde::Deserialize;

use crate::bridge::CancellationToken;
use crate::error::{BridgeError, FlowError, FlowResult};
use crate::result::DataResult;

use super::{Emitter, Publisher, Subscriber, SubscriptionId};

/// Queue sizing for a [`ChannelPublisher`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelPublisherConfig {
    /// Max queued emissions; beyond it the oldest queued one is dropped.
    pub emission_queue_capacity: usize,
    /// Max queued control messages (subscribe/unsubscribe/replay).
    pub control_queue_capacity: usize,
}

impl Default for ChannelPublisherConfig {
    fn default() -> Self {
        Self {
            emission_queue_capacity: 1024,
            control_queue_capacity: 256,
        }
    }
}

enum ControlMsg<T> {
    Subscribe {
        id: SubscriptionId,
        subscriber: Subscriber<T>,
        token: CancellationToken,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
    Replay {
        id: SubscriptionId,
    },
}

struct SubscriberEntry<T> {
    id: SubscriptionId,
    subscriber: Subscriber<T>,
    token: CancellationToken,
}

/// Publisher delivering on its own worker thread.
pub struct ChannelPublisher<T> {
    control_tx: Sender<ControlMsg<T>>,
    emit_tx: Sender<DataResult<T>>,
    // Emitter-side handle on the queue, used to shed the oldest emission.
    emit_shed: Receiver<DataResult<T>>,
    latest: Mutex<Option<DataResult<T>>>,
    closed: AtomicBool,
    dropped_emissions: AtomicU64,
}

impl<T> std::fmt::Debug for ChannelPublisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelPublisher")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .field("dropped_emissions", &self.dropped_emissions.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T> ChannelPublisher<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawn the worker thread.
    pub fn new(cfg: &ChannelPublisherConfig) -> FlowResult<Self> {
        let (control_tx, control_rx) = bounded::<ControlMsg<T>>(cfg.control_queue_capacity.max(1));
        let (emit_tx, emit_rx) = bounded::<DataResult<T>>(cfg.emission_queue_capacity.max(1));

        thread::Builder::new()
            .name("resultflow-publisher".to_string())
            .spawn({
                let emit_rx = emit_rx.clone();
                move || worker_loop(control_rx, emit_rx)
            })
            .map_err(|e| FlowError::internal(format!("failed to spawn publisher worker: {e}")))?;

        Ok(Self {
            control_tx,
            emit_tx,
            emit_shed: emit_rx,
            latest: Mutex::new(None),
            closed: AtomicBool::new(false),
            dropped_emissions: AtomicU64::new(0),
        })
    }

    /// Non-blocking emission enqueue. Returns an error once closed; a full
    /// queue drops its oldest emission (counted) to make room.
    pub fn emit(&self, value: DataResult<T>) -> FlowResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(closed().into());
        }

        // Held across the enqueue so the mirror and the queue agree on order.
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let mut pending = value.clone();
        loop {
            match self.emit_tx.try_send(pending) {
                Ok(()) => break,
                Err(TrySendError::Full(returned)) => {
                    pending = returned;
                    if self.emit_shed.try_recv().is_ok() {
                        let dropped = self.dropped_emissions.fetch_add(1, Ordering::Relaxed) + 1;
                        tracing::warn!(dropped, "publisher queue full; oldest emission dropped");
                    }
                }
                Err(TrySendError::Disconnected(_)) => return Err(closed().into()),
            }
        }
        *latest = Some(value);
        Ok(())
    }
}

impl<T> ChannelPublisher<T> {
    #[must_use]
    pub fn dropped_emissions(&self) -> u64 {
        self.dropped_emissions.load(Ordering::Relaxed)
    }

    /// Stop accepting emissions and subscriptions. Already queued emissions
    /// are still delivered.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn closed() -> BridgeError {
    BridgeError::PublisherClosed {
        path: "channel_publisher".to_string(),
    }
}

impl<T> Publisher<T> for ChannelPublisher<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Subscriber<T>, token: CancellationToken) -> FlowResult<SubscriptionId> {
        if self.is_closed() {
            return Err(closed().into());
        }

        let id = SubscriptionId::new();
        self.control_tx
            .send(ControlMsg::Subscribe { id, subscriber, token })
            .map_err(|_| FlowError::from(closed()))?;
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        // May run on the worker thread itself (auto-detach), so never block.
        // The subscriber's token is already cancelled, so a lost message only
        // delays pruning.
        if let Err(err) = self.control_tx.try_send(ControlMsg::Unsubscribe { id }) {
            tracing::warn!(subscription = %id, full = err.is_full(), "unsubscribe not queued");
        }
    }

    fn replay(&self, id: SubscriptionId) {
        if let Err(err) = self.control_tx.try_send(ControlMsg::Replay { id }) {
            tracing::warn!(subscription = %id, full = err.is_full(), "replay request dropped");
        }
    }

    fn latest(&self) -> Option<DataResult<T>> {
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }
}

impl<T> Emitter<T> for ChannelPublisher<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn emit(&self, value: DataResult<T>) -> FlowResult<()> {
        ChannelPublisher::emit(self, value)
    }

    fn current_data(&self) -> Option<T> {
        self.latest().and_then(DataResult::into_data)
    }
}

fn deliver<T>(entry: &SubscriberEntry<T>, value: &DataResult<T>) {
    if !entry.token.is_cancelled() {
        (entry.subscriber)(value);
    }
}

fn handle_control<T>(msg: ControlMsg<T>, subs: &mut Vec<SubscriberEntry<T>>, latest: Option<&DataResult<T>>) {
    match msg {
        ControlMsg::Subscribe { id, subscriber, token } => {
            let entry = SubscriberEntry { id, subscriber, token };
            if let Some(value) = latest {
                deliver(&entry, value);
            }
            subs.push(entry);
        }
        ControlMsg::Unsubscribe { id } => {
            subs.retain(|s| s.id != id);
        }
        ControlMsg::Replay { id } => {
            if let (Some(value), Some(entry)) = (latest, subs.iter().find(|s| s.id == id)) {
                deliver(entry, value);
            }
        }
    }
}

fn worker_loop<T>(control_rx: Receiver<ControlMsg<T>>, emit_rx: Receiver<DataResult<T>>) {
    let mut subs: Vec<SubscriberEntry<T>> = Vec::new();
    let mut latest: Option<DataResult<T>> = None;

    let mut control_closed = false;
    let mut emit_closed = false;

    loop {
        select! {
            recv(control_rx) -> msg => {
                match msg {
                    Ok(msg) => handle_control(msg, &mut subs, latest.as_ref()),
                    Err(_) => {
                        control_closed = true;
                    }
                }
            }
            recv(emit_rx) -> msg => {
                match msg {
                    Ok(value) => {
                        // Subscriptions sent before this emission must see it.
                        while let Ok(msg) = control_rx.try_recv() {
                            handle_control(msg, &mut subs, latest.as_ref());
                        }
                        subs.retain(|s| !s.token.is_cancelled());
                        for entry in &subs {
                            deliver(entry, &value);
                        }
                        latest = Some(value);
                    }
                    Err(_) => {
                        emit_closed = true;
                    }
                }
            }
        }

        if control_closed && emit_closed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crossbeam_channel::unbounded;

    use super::*;

    fn forwarding(tx: crossbeam_channel::Sender<DataResult<i32>>) -> Subscriber<i32> {
        Arc::new(move |r: &DataResult<i32>| {
            let _ = tx.send(r.clone());
        })
    }

    #[test]
    fn delivers_on_worker_in_order() {
        let publisher = ChannelPublisher::new(&ChannelPublisherConfig::default()).unwrap();
        let (tx, rx) = unbounded();
        publisher.subscribe(forwarding(tx), CancellationToken::new()).unwrap();

        publisher.emit(DataResult::loading(None)).unwrap();
        publisher.emit(DataResult::success(1)).unwrap();

        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(first.is_loading());
        assert_eq!(second, DataResult::success(1));
    }

    #[test]
    fn replay_redelivers_latest() {
        let publisher = ChannelPublisher::new(&ChannelPublisherConfig::default()).unwrap();
        publisher.emit(DataResult::success(3)).unwrap();

        let (tx, rx) = unbounded();
        let id = publisher.subscribe(forwarding(tx), CancellationToken::new()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), DataResult::success(3));

        publisher.replay(id);
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), DataResult::success(3));
        assert_eq!(publisher.latest(), Some(DataResult::success(3)));
    }

    #[test]
    fn closed_publisher_rejects_emit() {
        let publisher = ChannelPublisher::<i32>::new(&ChannelPublisherConfig::default()).unwrap();
        publisher.close();
        assert!(publisher.emit(DataResult::success(1)).unwrap_err().is_bridge());
        let (tx, _rx) = unbounded();
        assert!(publisher.subscribe(forwarding(tx), CancellationToken::new()).is_err());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn full_control_queue_warns_on_lost_replay() {
        let config = ChannelPublisherConfig {
            control_queue_capacity: 1,
            ..ChannelPublisherConfig::default()
        };
        let publisher = ChannelPublisher::new(&config).unwrap();
        let (started_tx, started_rx) = unbounded::<()>();
        let (release_tx, release_rx) = unbounded::<()>();
        let (tx, rx) = unbounded();
        let blocking: Subscriber<i32> = Arc::new(move |r: &DataResult<i32>| {
            if r.data() == Some(&1) {
                let _ = started_tx.send(());
                let _ = release_rx.recv();
            }
            let _ = tx.send(r.clone());
        });
        let id = publisher.subscribe(blocking, CancellationToken::new()).unwrap();
        publisher.emit(DataResult::success(1)).unwrap();
        started_rx.recv_timeout(Duration::from_secs(1)).unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            publisher.replay(id);
            publisher.replay(id);
        });
        let text = String::from_utf8_lossy(&captured.0.lock().unwrap()).into_owned();
        assert!(text.contains("replay request dropped"));

        release_tx.send(()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), DataResult::success(1));
        // The queued replay still arrives.
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), DataResult::success(1));
    }

    #[test]
    fn cancelled_subscription_is_skipped() {
        let publisher = ChannelPublisher::new(&ChannelPublisherConfig::default()).unwrap();
        let (tx, rx) = unbounded();
        let token = CancellationToken::new();
        publisher.subscribe(forwarding(tx), token.clone()).unwrap();
        token.cancel();
        publisher.emit(DataResult::success(1)).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
