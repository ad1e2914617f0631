//! TTL cache mapping opaque handles to real session identifiers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::types::SessionHandle;

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

type Entries = Mutex<HashMap<SessionHandle, CacheEntry>>;

/// A concurrency-safe TTL store for session identifiers.
///
/// Lookups are the primary expiry mechanism: `get` checks the entry's
/// deadline directly, so an expired entry is invisible even before the
/// background sweep has run. The sweep exists only to reclaim memory for
/// abandoned entries; it runs on a coarser interval than the TTL itself,
/// so it can never remove an entry that could still be live.
///
/// The sweep task holds a weak reference to the store and exits when the
/// cache is dropped.
///
/// # Panics
///
/// `new` must be called within a Tokio runtime, as it spawns the sweep
/// task.
pub struct SessionCache {
    entries: Arc<Entries>,
    ttl: Duration,
    sweeper: tokio::task::JoinHandle<()>,
}

impl SessionCache {
    /// Create a cache with the given entry TTL and sweep interval.
    ///
    /// The sweep interval is clamped to at least `ttl`.
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        let entries = Arc::new(Mutex::new(HashMap::new()));
        let sweeper = tokio::spawn(sweep(Arc::downgrade(&entries), sweep_interval.max(ttl)));
        Self {
            entries,
            ttl,
            sweeper,
        }
    }

    /// Store a value under a handle, resetting its TTL.
    pub fn put(&self, handle: SessionHandle, value: impl Into<String>) {
        let entry = CacheEntry {
            value: value.into(),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.lock().unwrap().insert(handle, entry);
    }

    /// Look up a live entry. Expired entries are not found.
    pub fn get(&self, handle: &SessionHandle) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(handle)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Re-arm the TTL of a live entry. Returns false if the entry is
    /// absent or already expired.
    pub fn refresh(&self, handle: &SessionHandle) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get_mut(handle) else {
            return false;
        };
        if Instant::now() >= entry.expires_at {
            return false;
        }
        entry.expires_at = Instant::now() + self.ttl;
        true
    }

    /// Remove an entry, returning its value if it was still live.
    pub fn remove(&self, handle: &SessionHandle) -> Option<String> {
        let entry = self.entries.lock().unwrap().remove(handle)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        Some(entry.value)
    }

    /// Number of entries currently held, including expired entries the
    /// sweep has not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns true when no entries are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SessionCache {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

async fn sweep(entries: Weak<Entries>, interval: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    loop {
        ticker.tick().await;
        let Some(entries) = entries.upgrade() else {
            break;
        };
        let now = Instant::now();
        let mut entries = entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Swept expired session entries");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(5);
    const SWEEP: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn put_then_get_round_trips() {
        let cache = SessionCache::new(TTL, SWEEP);
        let handle = SessionHandle::mint();
        cache.put(handle.clone(), "S-1");
        assert_eq!(cache.get(&handle), Some("S-1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn get_misses_after_ttl_before_sweep() {
        let cache = SessionCache::new(TTL, SWEEP);
        let handle = SessionHandle::mint();
        cache.put(handle.clone(), "S-1");

        tokio::time::advance(TTL).await;

        // Expired for lookups, but still resident until the sweep runs.
        assert_eq!(cache.get(&handle), None);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn absent_handle_is_a_miss_not_an_error() {
        let cache = SessionCache::new(TTL, SWEEP);
        assert_eq!(cache.get(&SessionHandle::mint()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn put_overwrites_and_resets_ttl() {
        let cache = SessionCache::new(TTL, SWEEP);
        let handle = SessionHandle::mint();
        cache.put(handle.clone(), "S-1");

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        cache.put(handle.clone(), "S-2");
        tokio::time::advance(Duration::from_secs(2)).await;

        // The rewrite re-armed the TTL, so the entry survives the original
        // deadline and carries the new value.
        assert_eq!(cache.get(&handle), Some("S-2".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_extends_a_live_entry() {
        let cache = SessionCache::new(TTL, SWEEP);
        let handle = SessionHandle::mint();
        cache.put(handle.clone(), "S-1");

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        assert!(cache.refresh(&handle));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&handle), Some("S-1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_of_expired_entry_fails() {
        let cache = SessionCache::new(TTL, SWEEP);
        let handle = SessionHandle::mint();
        cache.put(handle.clone(), "S-1");

        tokio::time::advance(TTL).await;
        assert!(!cache.refresh(&handle));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_returns_live_value() {
        let cache = SessionCache::new(TTL, SWEEP);
        let handle = SessionHandle::mint();
        cache.put(handle.clone(), "S-1");

        assert_eq!(cache.remove(&handle), Some("S-1".to_string()));
        assert_eq!(cache.get(&handle), None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_never_removes_entries_before_ttl() {
        let cache = SessionCache::new(TTL, SWEEP);
        let handle = SessionHandle::mint();
        cache.put(handle.clone(), "S-1");

        // Just short of the TTL: no sweep interval >= TTL can have fired.
        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(cache.get(&handle), Some("S-1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_reclaims_abandoned_entries() {
        let cache = SessionCache::new(TTL, SWEEP);
        cache.put(SessionHandle::mint(), "S-1");
        cache.put(SessionHandle::mint(), "S-2");

        tokio::time::advance(SWEEP).await;
        // Give the sweep task a chance to observe the tick.
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_interval_is_clamped_to_ttl() {
        // A sweep shorter than the TTL must not purge live entries early.
        let cache = SessionCache::new(TTL, Duration::from_secs(1));
        let handle = SessionHandle::mint();
        cache.put(handle.clone(), "S-1");

        tokio::time::advance(Duration::from_secs(2)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.get(&handle), Some("S-1".to_string()));
    }
}
