use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

/// Single-shot callback on its own thread. Cancelled by `cancel()` or drop.
pub struct DeferredAction {
    cancel: Option<Sender<()>>,
}

impl DeferredAction {
    pub fn schedule<F>(after: Duration, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel, rx) = mpsc::channel::<()>();
        thread::spawn(move || {
            // A message or a dropped sender both mean "cancelled".
            if let Err(RecvTimeoutError::Timeout) = rx.recv_timeout(after) {
                action();
            }
        });
        Self {
            cancel: Some(cancel),
        }
    }

    /// Does not wait for the worker; an action already running completes.
    pub fn cancel(mut self) {
        self.cancel.take();
    }
}

impl Drop for DeferredAction {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn fires_after_delay() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let action = DeferredAction::schedule(Duration::from_millis(20), move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(200));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // Dropping after it fired is harmless.
        drop(action);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_prevents_firing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let action = DeferredAction::schedule(Duration::from_millis(100), move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        action.cancel();
        thread::sleep(Duration::from_millis(250));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
