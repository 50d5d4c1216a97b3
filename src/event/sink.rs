//! Error sinks receiving handler failures isolated during dispatch.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::error::DataResultError;
use crate::publisher::SubscriptionId;
use crate::result::Status;

/// A handler failure, wrapped and timestamped.
#[derive(Debug, Clone)]
pub struct FaultReport {
    /// The wrapped failure (always `DataResultError::Handler`).
    pub error: Arc<DataResultError>,
    /// Status of the emission being dispatched.
    pub status: Status,
    /// Subscription the emission arrived on, when dispatched by a bridge.
    pub origin: Option<SubscriptionId>,
    pub reported_at: DateTime<Utc>,
}

impl FaultReport {
    #[must_use]
    pub fn new(error: Arc<DataResultError>, status: Status) -> Self {
        Self {
            error,
            status,
            origin: None,
            reported_at: Utc::now(),
        }
    }
}

/// Receives handler failures for observability.
pub trait ErrorSink: Send + Sync {
    /// Called once per failed handler invocation.
    fn report(&self, report: FaultReport);
}

impl<F> ErrorSink for F
where
    F: Fn(FaultReport) + Send + Sync,
{
    fn report(&self, report: FaultReport) {
        self(report);
    }
}

/// Fallback sink used when no sink is configured: the unhandled-fault
/// channel, an `error` level tracing event.
///
/// When no tracing subscriber would record that event the report is written
/// to stderr instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnhandledFaultSink;

impl UnhandledFaultSink {
    fn report_to(self, report: &FaultReport, fallback: &mut dyn Write) {
        if tracing::enabled!(tracing::Level::ERROR) {
            tracing::error!(
                status = %report.status,
                origin = ?report.origin,
                error = %report.error,
                cause = %report.error.cause(),
                "unhandled handler fault"
            );
            return;
        }
        let origin = report.origin.map_or_else(|| "none".to_string(), |id| id.to_string());
        let _ = writeln!(
            fallback,
            "{} unhandled handler fault: status={} origin={} error={} cause={}",
            report.reported_at.to_rfc3339(),
            report.status,
            origin,
            report.error,
            report.error.cause()
        );
    }
}

impl ErrorSink for UnhandledFaultSink {
    fn report(&self, report: FaultReport) {
        self.report_to(&report, &mut io::stderr().lock());
    }
}

/// Sink that keeps every report in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<FaultReport>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the reports received so far.
    #[must_use]
    pub fn reports(&self) -> Vec<FaultReport> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.lock().map(|r| r.len()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, report: FaultReport) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report);
        }
    }
}

/// Stamps the subscription id onto reports before forwarding them.
pub(crate) struct OriginSink<'a> {
    pub(crate) inner: &'a dyn ErrorSink,
    pub(crate) origin: Option<SubscriptionId>,
}

impl ErrorSink for OriginSink<'_> {
    fn report(&self, mut report: FaultReport) {
        report.origin = self.origin;
        self.inner.report(report);
    }
}
