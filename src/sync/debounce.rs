use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Pending delayed call
#[derive(Debug, Clone)]
pub struct DebounceHandle {
    abort: AbortHandle,
}

impl DebounceHandle {
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Run `task` once `delay` has elapsed unless cancelled before then.
/// After the delay the task runs detached, so a late cancel does not
/// interrupt a request already in flight.
pub fn schedule<F>(task: F, delay: Duration) -> DebounceHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    let timer = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        tokio::spawn(task);
    });

    DebounceHandle {
        abort: timer.abort_handle(),
    }
}

/// Trailing-edge debounce: each call replaces the pending one, only the
/// last call of a quiet period runs
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<DebounceHandle>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn call<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = schedule(task, self.delay);
        let previous = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);

        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.cancel();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
