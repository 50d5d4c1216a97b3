//! Upstream job runner producing `loading` then `success`/`error` emissions.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::bridge::CancellationToken;
use crate::error::{BoxError, FlowError, FlowResult};
use crate::publisher::Emitter;
use crate::result::transform::catch_fault;
use crate::result::{DataResult, ErrorValue};

/// Runs a job and publishes its lifecycle into an [`Emitter`].
///
/// The job first produces a `Loading` emission (carrying the emitter's
/// current data when `retain_data` is set), then `Success` with its output,
/// or `Error` wrapping its failure. A panicking job is reported as an error.
/// Once the task is cancelled, nothing further is emitted.
pub struct ResultTask<T> {
    emitter: Arc<dyn Emitter<T>>,
    name: String,
    retain_data: bool,
}

impl<T> std::fmt::Debug for ResultTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultTask")
            .field("name", &self.name)
            .field("retain_data", &self.retain_data)
            .finish_non_exhaustive()
    }
}

/// Handle to a spawned [`ResultTask`].
#[derive(Debug)]
pub struct TaskHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Request cancellation; the job sees it through its token.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task thread to finish.
    pub fn join(self) -> FlowResult<()> {
        self.join
            .join()
            .map_err(|_| FlowError::internal("result task thread panicked"))
    }
}

impl<T> ResultTask<T>
where
    T: Clone + Send + 'static,
{
    #[must_use]
    pub fn new(emitter: Arc<dyn Emitter<T>>) -> Self {
        Self {
            emitter,
            name: "resultflow-task".to_string(),
            retain_data: false,
        }
    }

    /// Thread name used by [`ResultTask::spawn`].
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Carry the emitter's current data through `Loading` and `Error`.
    #[must_use]
    pub const fn retain_data(mut self, retain: bool) -> Self {
        self.retain_data = retain;
        self
    }

    /// Run `job` on a new thread.
    pub fn spawn<F, E>(self, job: F) -> FlowResult<TaskHandle>
    where
        F: FnOnce(&CancellationToken) -> Result<T, E> + Send + 'static,
        E: Into<BoxError>,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let name = self.name.clone();
        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                if let Err(err) = self.execute(&task_token, job) {
                    tracing::warn!(task = %name, error = %err, "result task could not publish");
                }
            })
            .map_err(|e| FlowError::internal(format!("failed to spawn result task: {e}")))?;
        Ok(TaskHandle { token, join })
    }

    /// Run `job` on the calling thread.
    pub fn run<F, E>(self, job: F) -> FlowResult<()>
    where
        F: FnOnce(&CancellationToken) -> Result<T, E>,
        E: Into<BoxError>,
    {
        self.execute(&CancellationToken::new(), job)
    }

    fn execute<F, E>(&self, token: &CancellationToken, job: F) -> FlowResult<()>
    where
        F: FnOnce(&CancellationToken) -> Result<T, E>,
        E: Into<BoxError>,
    {
        let stale = if self.retain_data {
            self.emitter.current_data()
        } else {
            None
        };
        self.emitter.emit(DataResult::loading(stale.clone()))?;

        let outcome = match catch_fault(|| job(token)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(err.into()),
            Err(panicked) => Err(panicked),
        };

        if token.is_cancelled() {
            tracing::debug!(task = %self.name, "result task cancelled; outcome discarded");
            return Ok(());
        }

        let emission = match outcome {
            Ok(value) => DataResult::success(value),
            Err(cause) => DataResult::error(ErrorValue::from_boxed(cause), stale),
        };
        self.emitter.emit(emission)
    }
}
