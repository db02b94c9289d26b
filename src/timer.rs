use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to a repeating scheduled task. Once cancelled the task never fires again.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// Calls `on_tick` every `interval` until cancelled or until `on_tick` returns false.
    pub fn spawn<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let worker = thread::spawn(move || loop {
            thread::sleep(interval);
            if flag.load(Ordering::SeqCst) || !on_tick() {
                break;
            }
        });

        Self {
            cancelled,
            worker: Some(worker),
        }
    }

    /// A handle with no background task, for sessions driven by explicit ticks
    pub fn manual() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // the worker exits after its current sleep; no need to wait for it
        self.worker.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
