// src/project/debounce.rs

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Debounce interval for tasks that don't set their own.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Last start time per task within one namespace.
#[derive(Debug, Default)]
pub struct LastRuns {
    inner: Mutex<HashMap<String, Instant>>,
}

impl LastRuns {
    /// Record a run of `task` unless it already ran less than `window` ago.
    ///
    /// Check and update happen under one lock, so concurrent watch loops
    /// cannot both start the same task inside the window.
    pub fn try_begin(&self, task: &str, window: Duration) -> bool {
        let mut runs = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if let Some(last) = runs.get(task) {
            if now < *last + window {
                return false;
            }
        }
        runs.insert(task.to_string(), now);
        true
    }

    pub fn last_run(&self, task: &str) -> Option<Instant> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task)
            .copied()
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_start_inside_window_is_rejected() {
        let runs = LastRuns::default();
        assert!(runs.try_begin("a", Duration::from_secs(60)));
        assert!(!runs.try_begin("a", Duration::from_secs(60)));
        assert!(runs.try_begin("b", Duration::from_secs(60)));
    }

    #[test]
    fn zero_window_never_debounces() {
        let runs = LastRuns::default();
        assert!(runs.try_begin("a", Duration::ZERO));
        assert!(runs.try_begin("a", Duration::ZERO));
    }

    #[test]
    fn clearing_forgets_history() {
        let runs = LastRuns::default();
        assert!(runs.try_begin("a", Duration::from_secs(60)));
        assert!(runs.last_run("a").is_some());
        runs.clear();
        assert!(runs.last_run("a").is_none());
        assert!(runs.try_begin("a", Duration::from_secs(60)));
    }
}
