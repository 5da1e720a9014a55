//! Cache layer that decides what the HTTP client may read from and write to the store.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::rules::RuleTable;
use super::store::CacheStore;
use crate::http::{ApiRequest, Method, CACHE_BUST_PARAM};

/// Cache layer sitting inside the API client.
///
/// Only GET requests whose path matches a rule and that were not explicitly
/// bypassed take part in caching.
pub struct CacheLayer {
  store: Arc<dyn CacheStore>,
  rules: RuleTable,
}

impl CacheLayer {
  pub fn new(store: Arc<dyn CacheStore>, rules: RuleTable) -> Self {
    Self { store, rules }
  }

  pub fn rules(&self) -> &RuleTable {
    &self.rules
  }

  pub fn store(&self) -> &Arc<dyn CacheStore> {
    &self.store
  }

  pub fn should_cache(&self, request: &ApiRequest) -> bool {
    request.method == Method::Get
      && !request.bypass_cache
      && self.rules.resolve(&request.path).is_some()
  }

  /// Store key for a cacheable request.
  ///
  /// Query params other than the cache-busting one are folded in as a hash so
  /// different pages of the same resource don't collide.
  pub fn cache_key(&self, request: &ApiRequest) -> Option<String> {
    let key = self.rules.resolve_cache_key(&request.path)?;

    let mut params: Vec<&(String, String)> = request
      .query
      .iter()
      .filter(|(name, _)| name != CACHE_BUST_PARAM)
      .collect();
    if params.is_empty() {
      return Some(key);
    }
    params.sort();

    let mut hasher = Sha256::new();
    for (name, value) in params {
      hasher.update(name.as_bytes());
      hasher.update(b"=");
      hasher.update(value.as_bytes());
      hasher.update(b"&");
    }
    let digest = hex::encode(hasher.finalize());
    Some(format!("{}?{}", key, &digest[..16]))
  }

  /// Fresh cached payload for `request`, if any.
  pub fn lookup(&self, request: &ApiRequest) -> Option<Value> {
    if !self.should_cache(request) {
      return None;
    }
    let key = self.cache_key(request)?;
    let value = self.store.get(&key);
    if value.is_some() {
      tracing::debug!(key = %key, path = %request.path, "cache hit");
    }
    value
  }

  /// Write a successful response through to the store.
  pub fn write_through(&self, request: &ApiRequest, value: &Value) {
    if !self.should_cache(request) {
      return;
    }
    let Some(ttl_ms) = self.rules.resolve_ttl(&request.path) else {
      return;
    };
    if let Some(key) = self.cache_key(request) {
      tracing::debug!(key = %key, ttl_ms, "cache write");
      self.store.set(&key, value.clone(), ttl_ms);
    }
  }

  pub fn invalidate(&self, key: &str) {
    self.store.invalidate(key);
  }

  pub fn clear(&self) {
    self.store.clear();
  }
}
