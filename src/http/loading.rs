use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Global outstanding-request counter. A loading indicator is visible iff
/// the count is above zero. The count can never go negative: decrement is
/// saturating and tied to a guard's drop, so error paths are covered too.
#[derive(Clone, Default)]
pub struct LoadingTracker {
    active: Arc<AtomicUsize>,
}

impl LoadingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a request as started. Dropping the returned guard marks it
    /// finished, whatever the outcome.
    pub fn start(&self) -> LoadingGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        LoadingGuard {
            active: Arc::clone(&self.active),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_loading(&self) -> bool {
        self.active() > 0
    }
}

pub struct LoadingGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_tracks_starts_minus_ends() {
        let tracker = LoadingTracker::new();
        assert!(!tracker.is_loading());

        let a = tracker.start();
        let b = tracker.start();
        assert_eq!(tracker.active(), 2);

        drop(a);
        assert_eq!(tracker.active(), 1);
        drop(b);
        assert_eq!(tracker.active(), 0);
        assert!(!tracker.is_loading());
    }

    #[test]
    fn guard_decrements_on_error_paths_too() {
        let tracker = LoadingTracker::new();
        let result: Result<(), &str> = (|| {
            let _guard = tracker.start();
            Err("request failed")
        })();
        assert!(result.is_err());
        assert_eq!(tracker.active(), 0);
    }

    #[tokio::test]
    async fn concurrent_guards_settle_back_to_zero() {
        let tracker = LoadingTracker::new();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                let _guard = tracker.start();
                tokio::task::yield_now().await;
            }));
        }
        for handle in handles {
            handle.await.expect("task should not panic");
        }
        assert_eq!(tracker.active(), 0);
    }
}
