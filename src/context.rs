//! Shared dispatch context handed to bridges.

use std::sync::Arc;

use tracing::Dispatch;

use crate::config::FlowConfig;
use crate::event::{ErrorSink, UnhandledFaultSink};
use crate::observability::LogRegistry;

/// Configuration, error sink and logging a bridge dispatches with.
///
/// Cheap to clone; one context is typically shared by every bridge of an
/// application.
#[derive(Clone)]
pub struct FlowContext {
    config: Arc<FlowConfig>,
    sink: Arc<dyn ErrorSink>,
    logging: Option<Dispatch>,
}

impl std::fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowContext")
            .field("config", &self.config)
            .field("logging", &self.logging.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::new(FlowConfig::default())
    }
}

impl FlowContext {
    /// A context reporting handler faults to [`UnhandledFaultSink`].
    #[must_use]
    pub fn new(config: FlowConfig) -> Self {
        Self {
            config: Arc::new(config),
            sink: Arc::new(UnhandledFaultSink),
            logging: None,
        }
    }

    /// Route handler faults to `sink`.
    #[must_use]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Log dispatch activity to `registry` regardless of the delivering
    /// thread's default subscriber.
    #[must_use]
    pub fn with_logging(mut self, registry: &LogRegistry) -> Self {
        self.logging = Some(registry.dispatch().clone());
        self
    }

    #[must_use]
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    #[must_use]
    pub fn error_sink(&self) -> &dyn ErrorSink {
        self.sink.as_ref()
    }

    #[must_use]
    pub const fn logging(&self) -> Option<&Dispatch> {
        self.logging.as_ref()
    }

    /// Run `f` under the context's log dispatch, if any.
    pub(crate) fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.logging {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataResultError;
    use crate::event::{CollectingSink, FaultReport};
    use crate::result::Status;

    #[test]
    fn default_context_uses_default_config() {
        let ctx = FlowContext::default();
        assert_eq!(ctx.config(), &FlowConfig::default());
        assert!(ctx.logging().is_none());
    }

    #[test]
    fn custom_sink_receives_reports() {
        let sink = Arc::new(CollectingSink::new());
        let ctx = FlowContext::default().with_error_sink(sink.clone());
        ctx.error_sink().report(FaultReport::new(
            Arc::new(DataResultError::handler(Status::Error, "boom".into())),
            Status::Error,
        ));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn logging_is_attached_from_registry() {
        let registry = LogRegistry::from_config(&FlowConfig::default()).unwrap();
        let ctx = FlowContext::default().with_logging(&registry);
        assert!(ctx.logging().is_some());
        assert_eq!(ctx.in_scope(|| 4), 4);
    }
}
