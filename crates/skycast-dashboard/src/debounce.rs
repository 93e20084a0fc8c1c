//! Cancellable delayed tasks.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Runs only the most recently scheduled action, once `delay` passes with no
/// newer schedule.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    current: Option<CancellationToken>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            current: None,
        }
    }

    /// Schedule `action`, cancelling whatever was scheduled before.
    ///
    /// Must be called within a tokio runtime.
    pub fn schedule<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        // Deadline is fixed now, not when the task is first polled
        let deadline = Instant::now() + self.delay;

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => action(),
            }
        });

        self.current = Some(token);
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_only_last_value_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));
        let start = Instant::now();

        for (at, value) in [(0, "a"), (100, "ab"), (150, "abc")] {
            tokio::time::sleep_until(start + Duration::from_millis(at)).await;
            let tx = tx.clone();
            debouncer.schedule(move || {
                let _ = tx.send((Instant::now(), value));
            });
        }

        let (fired_at, value) = rx.recv().await.unwrap();
        assert_eq!(value, "abc");
        assert_eq!(fired_at - start, Duration::from_millis(450));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        debouncer.schedule(move || {
            let _ = tx.send(());
        });
        debouncer.cancel();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        {
            let mut debouncer = Debouncer::new(Duration::from_millis(300));
            debouncer.schedule(move || {
                let _ = tx.send(());
            });
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }
}
