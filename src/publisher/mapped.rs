use std::sync::Arc;

use crate::bridge::CancellationToken;
use crate::error::FlowResult;
use crate::result::DataResult;

use super::{Publisher, Subscriber, SubscriptionId};

type Stage<T, R> = Arc<dyn Fn(DataResult<T>) -> DataResult<R> + Send + Sync>;

/// A `Publisher<R>` view over a `Publisher<T>`.
///
/// The stage runs once per delivery, on the upstream delivery context, so
/// replays are transformed the same way as fresh emissions.
pub struct MappedPublisher<T, R> {
    upstream: Arc<dyn Publisher<T>>,
    stage: Stage<T, R>,
}

impl<T, R> MappedPublisher<T, R>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F>(upstream: Arc<dyn Publisher<T>>, stage: F) -> Self
    where
        F: Fn(DataResult<T>) -> DataResult<R> + Send + Sync + 'static,
    {
        Self {
            upstream,
            stage: Arc::new(stage),
        }
    }
}

impl<T, R> std::fmt::Debug for MappedPublisher<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedPublisher").finish_non_exhaustive()
    }
}

impl<T, R> Publisher<R> for MappedPublisher<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: 'static,
{
    fn subscribe(&self, subscriber: Subscriber<R>, token: CancellationToken) -> FlowResult<SubscriptionId> {
        let stage = Arc::clone(&self.stage);
        let forward: Subscriber<T> = Arc::new(move |emission: &DataResult<T>| {
            let mapped = stage(emission.clone());
            subscriber(&mapped);
        });
        self.upstream.subscribe(forward, token)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.upstream.unsubscribe(id);
    }

    fn replay(&self, id: SubscriptionId) {
        self.upstream.replay(id);
    }

    fn latest(&self) -> Option<DataResult<R>> {
        self.upstream.latest().map(|latest| (self.stage)(latest))
    }
}
