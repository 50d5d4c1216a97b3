//! Log registry built from configuration.
//!
//! The registry owns a `tracing` [`Dispatch`]. It can be installed as the
//! thread default with a scoped guard, installed globally, or handed to a
//! [`FlowContext`](crate::context::FlowContext) so that bridges log to it on
//! whatever thread delivers their emissions.

use tracing::dispatcher::{self, DefaultGuard};
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

use crate::config::FlowConfig;
use crate::error::{ConfigError, FlowResult};

/// A configured logging pipeline.
#[derive(Clone, Debug)]
pub struct LogRegistry {
    dispatch: Dispatch,
}

/// Restores the previous thread default when dropped.
#[must_use = "logging is uninstalled when the guard is dropped"]
#[derive(Debug)]
pub struct LoggingGuard {
    _guard: DefaultGuard,
}

impl LogRegistry {
    /// Build a `fmt` subscriber filtered by `RUST_LOG`, falling back to
    /// `config.log_level`.
    pub fn from_config(config: &FlowConfig) -> FlowResult<Self> {
        let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        let filter = build_filter(env.as_deref(), &config.log_level)?;
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_names(true)
            .finish();
        Ok(Self::with_subscriber(subscriber))
    }

    /// Wrap an arbitrary subscriber.
    #[must_use]
    pub fn with_subscriber<S>(subscriber: S) -> Self
    where
        S: tracing::Subscriber + Send + Sync + 'static,
    {
        Self {
            dispatch: Dispatch::new(subscriber),
        }
    }

    #[must_use]
    pub const fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Make this registry the current thread's default until the guard drops.
    pub fn install(&self) -> LoggingGuard {
        LoggingGuard {
            _guard: dispatcher::set_default(&self.dispatch),
        }
    }

    /// Install as the process-wide default. Fails if one is already set.
    pub fn install_global(&self) -> FlowResult<()> {
        dispatcher::set_global_default(self.dispatch.clone()).map_err(|e| {
            ConfigError::LogFilter {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Run `f` with this registry as the default.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        dispatcher::with_default(&self.dispatch, f)
    }
}

fn build_filter(env: Option<&str>, level: &str) -> Result<EnvFilter, ConfigError> {
    let directives = match env {
        Some(directives) if !directives.trim().is_empty() => directives,
        _ => level,
    };
    EnvFilter::try_new(directives).map_err(|e| ConfigError::LogFilter {
        message: format!("{directives}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn capturing_registry() -> (LogRegistry, Captured) {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        (LogRegistry::with_subscriber(subscriber), captured)
    }

    #[test]
    fn env_directives_win_over_config() {
        let filter = build_filter(Some("resultflow=trace"), "info").unwrap();
        assert!(filter.to_string().contains("resultflow=trace"));

        let fallback = build_filter(Some("   "), "warn").unwrap();
        assert!(fallback.to_string().contains("warn"));
        assert!(build_filter(None, "debug").is_ok());
    }

    #[test]
    fn invalid_directive_is_a_config_error() {
        let err = build_filter(None, "resultflow=notalevel").unwrap_err();
        assert!(matches!(err, ConfigError::LogFilter { .. }));
    }

    #[test]
    fn scope_routes_events_to_registry() {
        let (registry, captured) = capturing_registry();
        registry.scope(|| tracing::info!("inside scope"));
        tracing::info!("outside scope");

        let text = captured.text();
        assert!(text.contains("inside scope"));
        assert!(!text.contains("outside scope"));
    }

    #[test]
    fn guard_uninstalls_on_drop() {
        let (registry, captured) = capturing_registry();
        {
            let _guard = registry.install();
            tracing::debug!("while installed");
        }
        tracing::debug!("after drop");

        let text = captured.text();
        assert!(text.contains("while installed"));
        assert!(!text.contains("after drop"));
    }

    #[test]
    fn from_config_builds_a_registry() {
        let registry = LogRegistry::from_config(&FlowConfig::default()).unwrap();
        registry.scope(|| tracing::trace!("filtered out by default"));
    }
}
