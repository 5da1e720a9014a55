//! Routing table that decides which GET paths are cached, under what key and for how long.

use regex::Regex;
use std::fmt;
use std::sync::Arc;

use crate::error::{ApiError, Result};

/// Builds a cache key from the positional path parameters.
pub type KeyFn = Arc<dyn Fn(&[&str]) -> String + Send + Sync>;

/// How a rule turns a matched path into a cache key.
#[derive(Clone)]
pub enum KeySpec {
  /// Same key for every match (e.g. "products").
  Literal(String),
  /// `{name}` placeholders replaced by the matching path parameters.
  Template(String),
  /// Arbitrary function of the positional parameters.
  Derived(KeyFn),
}

impl fmt::Debug for KeySpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Literal(key) => f.debug_tuple("Literal").field(key).finish(),
      Self::Template(template) => f.debug_tuple("Template").field(template).finish(),
      Self::Derived(_) => f.write_str("Derived(..)"),
    }
  }
}

/// A compiled `/path/:param` pattern with its key and TTL.
#[derive(Debug, Clone)]
pub struct CacheRule {
  pattern: String,
  regex: Regex,
  params: Vec<String>,
  key: KeySpec,
  ttl_ms: u64,
}

impl CacheRule {
  pub fn new(pattern: &str, key: KeySpec, ttl_ms: u64) -> Result<Self> {
    if !pattern.starts_with('/') {
      return Err(ApiError::InvalidRule {
        pattern: pattern.to_string(),
        reason: "pattern must start with '/'".to_string(),
      });
    }

    let mut params = Vec::new();
    let mut source = String::from("^");
    for segment in pattern.trim_end_matches('/').split('/').skip(1) {
      source.push('/');
      if let Some(name) = segment.strip_prefix(':') {
        if name.is_empty() {
          return Err(ApiError::InvalidRule {
            pattern: pattern.to_string(),
            reason: "placeholder without a name".to_string(),
          });
        }
        params.push(name.to_string());
        source.push_str("([^/]+)");
      } else {
        source.push_str(&regex::escape(segment));
      }
    }
    source.push_str("/?$");

    let regex = Regex::new(&source).map_err(|e| ApiError::InvalidRule {
      pattern: pattern.to_string(),
      reason: e.to_string(),
    })?;

    Ok(Self {
      pattern: pattern.to_string(),
      regex,
      params,
      key,
      ttl_ms,
    })
  }

  pub fn literal(pattern: &str, key: &str, ttl_ms: u64) -> Result<Self> {
    Self::new(pattern, KeySpec::Literal(key.to_string()), ttl_ms)
  }

  pub fn template(pattern: &str, template: &str, ttl_ms: u64) -> Result<Self> {
    Self::new(pattern, KeySpec::Template(template.to_string()), ttl_ms)
  }

  pub fn derived<F>(pattern: &str, key: F, ttl_ms: u64) -> Result<Self>
  where
    F: Fn(&[&str]) -> String + Send + Sync + 'static,
  {
    Self::new(pattern, KeySpec::Derived(Arc::new(key)), ttl_ms)
  }

  pub fn pattern(&self) -> &str {
    &self.pattern
  }

  pub fn ttl_ms(&self) -> u64 {
    self.ttl_ms
  }

  /// Positional parameters if `path` matches this rule.
  fn captures<'p>(&self, path: &'p str) -> Option<Vec<&'p str>> {
    let caps = self.regex.captures(path)?;
    Some(
      caps
        .iter()
        .skip(1)
        .map(|m| m.map(|m| m.as_str()).unwrap_or_default())
        .collect(),
    )
  }

  fn key_for(&self, values: &[&str]) -> String {
    match &self.key {
      KeySpec::Literal(key) => key.clone(),
      KeySpec::Template(template) => self
        .params
        .iter()
        .zip(values)
        .fold(template.clone(), |key, (name, value)| {
          key.replace(&format!("{{{}}}", name), value)
        }),
      KeySpec::Derived(f) => f(values),
    }
  }
}

/// Key and TTL a path resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRule {
  pub key: String,
  pub ttl_ms: u64,
}

/// Ordered list of rules. The first rule whose pattern matches wins.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
  rules: Vec<CacheRule>,
}

impl RuleTable {
  pub fn new(rules: Vec<CacheRule>) -> Self {
    Self { rules }
  }

  /// Rules for the public catalog and the admin lists.
  ///
  /// `/products/featured` must stay ahead of `/products/:id`.
  pub fn storefront_defaults() -> Result<Self> {
    Ok(Self::new(vec![
      CacheRule::literal("/products", "products", 300_000)?,
      CacheRule::literal("/products/featured", "featured_products", 300_000)?,
      CacheRule::template("/products/:id", "product_{id}", 300_000)?,
      CacheRule::literal("/categories", "categories", 600_000)?,
      CacheRule::literal("/admin/users", "admin_users", 60_000)?,
      CacheRule::literal("/admin/products", "admin_products", 60_000)?,
    ]))
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  /// Key and TTL for `path`, or `None` when no rule matches.
  ///
  /// `path` is matched without its query string. The key does not reflect the
  /// query; see `CacheLayer::cache_key` for that.
  pub fn resolve(&self, path: &str) -> Option<ResolvedRule> {
    let path = path.split('?').next().unwrap_or_default();
    self.rules.iter().find_map(|rule| {
      rule.captures(path).map(|values| ResolvedRule {
        key: rule.key_for(&values),
        ttl_ms: rule.ttl_ms,
      })
    })
  }

  pub fn resolve_cache_key(&self, path: &str) -> Option<String> {
    self.resolve(path).map(|r| r.key)
  }

  pub fn resolve_ttl(&self, path: &str) -> Option<u64> {
    self.resolve(path).map(|r| r.ttl_ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_literal_key() {
    let table = RuleTable::storefront_defaults().unwrap();
    assert_eq!(table.resolve_cache_key("/products"), Some("products".into()));
    assert_eq!(table.resolve_ttl("/products"), Some(300_000));
  }

  #[test]
  fn test_template_key_uses_path_param() {
    let table = RuleTable::storefront_defaults().unwrap();
    assert_eq!(
      table.resolve_cache_key("/products/abc123"),
      Some("product_abc123".into())
    );
  }

  #[test]
  fn test_first_match_wins() {
    let table = RuleTable::storefront_defaults().unwrap();
    assert_eq!(
      table.resolve_cache_key("/products/featured"),
      Some("featured_products".into())
    );
  }

  #[test]
  fn test_derived_key_gets_positional_params() {
    let table = RuleTable::new(vec![CacheRule::derived(
      "/categories/:slug/products/:page",
      |p| format!("cat:{}:{}", p[0], p[1]),
      1000,
    )
    .unwrap()]);

    assert_eq!(
      table.resolve_cache_key("/categories/shoes/products/2"),
      Some("cat:shoes:2".into())
    );
  }

  #[test]
  fn test_no_match() {
    let table = RuleTable::storefront_defaults().unwrap();
    assert_eq!(table.resolve_cache_key("/orders"), None);
    assert_eq!(table.resolve_ttl("/orders"), None);
    // Placeholders don't span segments
    assert_eq!(table.resolve_cache_key("/products/a/b"), None);
  }

  #[test]
  fn test_trailing_slash_ignored() {
    let table = RuleTable::storefront_defaults().unwrap();
    assert_eq!(table.resolve_cache_key("/products/"), Some("products".into()));
  }

  #[test]
  fn test_resolution_is_deterministic() {
    let table = RuleTable::storefront_defaults().unwrap();
    for path in ["/products", "/products/p1", "/orders", "/admin/users"] {
      assert_eq!(table.resolve(path), table.resolve(path));
    }
  }

  #[test]
  fn test_literal_segments_are_escaped() {
    let table = RuleTable::new(vec![CacheRule::literal("/v1.0/items", "items", 10).unwrap()]);
    assert!(table.resolve("/v1.0/items").is_some());
    assert!(table.resolve("/v1x0/items").is_none());
  }

  #[test]
  fn test_invalid_patterns() {
    assert!(CacheRule::literal("products", "p", 1).is_err());
    assert!(CacheRule::literal("/products/:", "p", 1).is_err());
  }
}
