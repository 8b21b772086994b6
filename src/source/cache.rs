//! Time-bounded cache of fetched data, owned by an adapter instance

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A cache lookup result
#[derive(Debug, Clone, PartialEq)]
pub enum Cached<T> {
    /// Younger than the TTL; use it instead of calling upstream
    Fresh(T),
    /// Expired, but still good enough when upstream is failing
    Stale(T),
}

impl<T> Cached<T> {
    pub fn into_inner(self) -> T {
        match self {
            Cached::Fresh(v) | Cached::Stale(v) => v,
        }
    }
}

/// Keyed cache with a fixed time-to-live.
///
/// Expired entries are kept around so a failing upstream can fall back to
/// the last good value; `save` replaces them.
pub struct TtlCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (T, Instant)>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn load(&self, key: &str) -> Option<Cached<T>> {
        self.load_at(key, Instant::now())
    }

    pub fn save(&self, key: &str, data: T) {
        self.save_at(key, data, Instant::now());
    }

    fn load_at(&self, key: &str, now: Instant) -> Option<Cached<T>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let (data, saved_at) = entries.get(key)?;
        if now.saturating_duration_since(*saved_at) < self.ttl {
            Some(Cached::Fresh(data.clone()))
        } else {
            Some(Cached::Stale(data.clone()))
        }
    }

    fn save_at(&self, key: &str, data: T, now: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), (data, now));
    }
}
