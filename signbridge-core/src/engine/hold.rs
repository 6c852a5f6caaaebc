//! Press-and-hold detection with an owned, cancellable timer.

use std::time::Duration;

use tokio::task::JoinHandle;

pub const DEFAULT_HOLD: Duration = Duration::from_secs(2);

/// Fires an action once a press has been held for `delay`.
///
/// The pending timer belongs to this value: `release()` or dropping the
/// trigger cancels it. Must be pressed from within a tokio runtime.
pub struct HoldTrigger {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl HoldTrigger {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Arm the timer. A press while armed restarts it.
    pub fn press<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        }));
    }

    /// Returns `true` when the release came before the action fired.
    pub fn release(&mut self) -> bool {
        let armed = self.is_armed();
        self.cancel();
        armed
    }

    pub fn is_armed(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Default for HoldTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_HOLD)
    }
}

impl Drop for HoldTrigger {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_action(count: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let count = Arc::clone(count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_full_hold() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut hold = HoldTrigger::default();
        hold.press(counter_action(&fired));

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(hold.is_armed());

        tokio::time::sleep(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!hold.release());
    }

    #[tokio::test(start_paused = true)]
    async fn early_release_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut hold = HoldTrigger::default();
        hold.press(counter_action(&fired));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(hold.release());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_trigger_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let mut hold = HoldTrigger::new(Duration::from_millis(100));
            hold.press(counter_action(&fired));
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
