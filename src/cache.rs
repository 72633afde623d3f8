use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Time source for expiry checks. Injectable so tests can advance time
/// without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry<V> {
    value: V,
    fetched_at: Instant,
}

/// String-keyed cache where an entry is served until `ttl` has elapsed since
/// it was inserted. Entries are write-once per TTL window; expired entries
/// are simply overwritten by the next insert.
pub struct TtlCache<V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if self.clock.now().duration_since(entry.fetched_at) < self.ttl => {
                debug!(key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                debug!(key, "cache entry expired");
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, key: String, value: V) {
        let entry = Entry {
            value,
            fetched_at: self.clock.now(),
        };
        self.entries.write().await.insert(key, entry);
    }
}
