// src/watch/dedup.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::debug;

/// Events for the same path whose modification times fall within this window
/// are collapsed; operating systems often report one write several times.
pub const IGNORE_THRESHOLD: Duration = Duration::from_millis(50);

const DEFAULT_CAPACITY: usize = 4096;

/// Last delivered modification time per path.
///
/// Bounded: once `capacity` paths are tracked, the older half is dropped.
#[derive(Debug)]
pub struct DedupCache {
    last: HashMap<PathBuf, SystemTime>,
    threshold: Duration,
    capacity: usize,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(IGNORE_THRESHOLD, DEFAULT_CAPACITY)
    }
}

impl DedupCache {
    pub fn new(threshold: Duration, capacity: usize) -> Self {
        Self {
            last: HashMap::new(),
            threshold,
            capacity: capacity.max(2),
        }
    }

    /// Record `mtime` for `path` and report whether the event should be
    /// delivered.
    pub fn should_emit(&mut self, path: &Path, mtime: SystemTime) -> bool {
        let previous = self.last.insert(path.to_path_buf(), mtime);
        if self.last.len() > self.capacity {
            self.prune();
        }

        match previous {
            Some(prev) if mtime < prev + self.threshold => {
                debug!(?path, "duplicate change notification suppressed");
                false
            }
            _ => true,
        }
    }

    /// Forget a path, e.g. after it was deleted.
    pub fn forget(&mut self, path: &Path) {
        self.last.remove(path);
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }

    fn prune(&mut self) {
        let mut times: Vec<SystemTime> = self.last.values().copied().collect();
        times.sort();
        let cutoff = times[times.len() / 2];
        self.last.retain(|_, t| *t >= cutoff);
        debug!(remaining = self.last.len(), "pruned dedup cache");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_notifications_within_threshold_are_suppressed() {
        let mut cache = DedupCache::default();
        let t0 = SystemTime::now();
        let path = Path::new("/p/a.txt");

        assert!(cache.should_emit(path, t0));
        assert!(!cache.should_emit(path, t0));
        assert!(!cache.should_emit(path, t0 + Duration::from_millis(20)));
        assert!(cache.should_emit(path, t0 + Duration::from_millis(200)));
    }

    #[test]
    fn paths_are_tracked_independently() {
        let mut cache = DedupCache::default();
        let t0 = SystemTime::now();
        assert!(cache.should_emit(Path::new("/p/a"), t0));
        assert!(cache.should_emit(Path::new("/p/b"), t0));
    }

    #[test]
    fn forgotten_paths_emit_again() {
        let mut cache = DedupCache::default();
        let t0 = SystemTime::now();
        let path = Path::new("/p/a");
        assert!(cache.should_emit(path, t0));
        cache.forget(path);
        assert!(cache.should_emit(path, t0));
    }

    #[test]
    fn capacity_is_bounded() {
        let mut cache = DedupCache::new(IGNORE_THRESHOLD, 8);
        let t0 = SystemTime::now();
        for i in 0..20u64 {
            cache.should_emit(&PathBuf::from(format!("/p/{i}")), t0 + Duration::from_secs(i));
        }
        assert!(cache.len() <= 8);
        assert!(!cache.is_empty());
    }
}
