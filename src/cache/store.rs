//! Cache store trait and the in-memory implementation.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::clock::{Clock, SystemClock};

/// A single cached payload. Entries are replaced wholesale, never edited.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  pub key: String,
  pub value: Value,
  pub expires_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// Lookups never fail: anything unreadable is reported as a miss.
pub trait CacheStore: Send + Sync {
  /// Stored value for `key` if it has not expired yet.
  fn get(&self, key: &str) -> Option<Value>;

  /// Store `value` under `key` for `ttl_ms`, replacing any previous entry.
  fn set(&self, key: &str, value: Value, ttl_ms: u64);

  /// Drop `key` along with its query variants (`key?<fingerprint>`).
  fn invalidate(&self, key: &str);

  /// Drop everything.
  fn clear(&self);
}

/// Store that doesn't cache anything. Used when caching is disabled.
pub struct NoopStore;

impl CacheStore for NoopStore {
  fn get(&self, _key: &str) -> Option<Value> {
    None // Always miss
  }

  fn set(&self, _key: &str, _value: Value, _ttl_ms: u64) {}

  fn invalidate(&self, _key: &str) {}

  fn clear(&self) {}
}

/// Process-wide in-memory store.
///
/// Expired entries are ignored on read rather than evicted; the map is bounded
/// by the number of distinct keys the rule table can produce.
pub struct MemoryStore<C: Clock = SystemClock> {
  entries: Mutex<HashMap<String, CacheEntry>>,
  clock: C,
}

impl MemoryStore<SystemClock> {
  pub fn new() -> Self {
    Self::with_clock(SystemClock)
  }
}

impl Default for MemoryStore<SystemClock> {
  fn default() -> Self {
    Self::new()
  }
}

impl<C: Clock> MemoryStore<C> {
  pub fn with_clock(clock: C) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      clock,
    }
  }

  /// Number of stored entries, expired ones included.
  pub fn len(&self) -> usize {
    self.entries.lock().map(|e| e.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<C: Clock> CacheStore for MemoryStore<C> {
  fn get(&self, key: &str) -> Option<Value> {
    let entries = self.entries.lock().ok()?;
    let entry = entries.get(key)?;
    if self.clock.now() < entry.expires_at {
      Some(entry.value.clone())
    } else {
      None
    }
  }

  fn set(&self, key: &str, value: Value, ttl_ms: u64) {
    let now = self.clock.now();
    let expires_at = i64::try_from(ttl_ms)
      .ok()
      .and_then(Duration::try_milliseconds)
      .and_then(|ttl| now.checked_add_signed(ttl))
      .unwrap_or(DateTime::<Utc>::MAX_UTC);

    if let Ok(mut entries) = self.entries.lock() {
      entries.insert(
        key.to_string(),
        CacheEntry {
          key: key.to_string(),
          value,
          expires_at,
        },
      );
    }
  }

  fn invalidate(&self, key: &str) {
    let variant_prefix = format!("{}?", key);
    if let Ok(mut entries) = self.entries.lock() {
      entries.retain(|k, _| k != key && !k.starts_with(&variant_prefix));
    }
  }

  fn clear(&self) {
    if let Ok(mut entries) = self.entries.lock() {
      entries.clear();
    }
  }
}
