//! Single-flight supervisor for execution tasks.

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// At-most-one-task supervisor.
///
/// The engine enforces "at most one in-flight execution system-wide"
/// through this slot: [`try_submit`](Self::try_submit) admits a new
/// task only when the previous one has finished, and
/// [`cancel_and_wait`](Self::cancel_and_wait) cancels the running task
/// cooperatively and waits for it to exit.
#[derive(Debug, Default)]
pub struct ExecutionSlot {
    current: Mutex<Option<RunningTask>>,
}

#[derive(Debug)]
struct RunningTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl ExecutionSlot {
    /// Empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a task if the slot is free.
    ///
    /// `spawn` receives the per-task cancellation token and returns the
    /// running task's handle. Returns whether the task was admitted; a
    /// rejected submission spawns nothing.
    pub fn try_submit<F>(&self, spawn: F) -> bool
    where
        F: FnOnce(CancellationToken) -> JoinHandle<()>,
    {
        let mut current = self.current.lock();
        if let Some(task) = current.as_ref()
            && !task.handle.is_finished()
        {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = spawn(cancel.clone());
        *current = Some(RunningTask { handle, cancel });
        true
    }

    /// Whether a task is currently running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Cancel the running task, if any, and wait for it to exit.
    pub async fn cancel_and_wait(&self) {
        let task = self.current.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await
                && e.is_panic()
            {
                error!(error = %e, "Execution task panicked");
            }
        }
    }
}
