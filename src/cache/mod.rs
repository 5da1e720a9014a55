//! Client-side request cache.
//!
//! This module provides the TTL cache used by the API client:
//! - A rule table mapping GET paths (`/products/:id`) to cache keys and TTLs
//! - A store holding JSON payloads until they expire
//! - A layer deciding when a request may be served from, or written to, the store

mod clock;
mod layer;
mod rules;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use layer::CacheLayer;
pub use rules::{CacheRule, KeyFn, KeySpec, ResolvedRule, RuleTable};
pub use store::{CacheEntry, CacheStore, MemoryStore, NoopStore};
