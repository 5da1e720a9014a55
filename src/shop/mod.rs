//! Storefront and admin services built on the shared API client.

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod coupons;
pub mod orders;
pub mod wishlist;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiError, Result};

/// The array under the first of `fields` that holds one, or `body` itself if it is an array.
pub(crate) fn list_field<'a>(body: &'a Value, fields: &[&str]) -> Option<&'a Vec<Value>> {
  if let Value::Array(items) = body {
    return Some(items);
  }
  fields
    .iter()
    .find_map(|field| body.get(*field).and_then(Value::as_array))
}

/// `body[field]` when the server wraps the payload, `body` otherwise.
pub(crate) fn unwrap_field<'a>(body: &'a Value, field: &str) -> &'a Value {
  match body.get(field) {
    Some(inner) if inner.is_object() => inner,
    _ => body,
  }
}

pub(crate) fn decode<T: DeserializeOwned>(value: &Value, what: &str) -> Result<T> {
  T::deserialize(value).map_err(|e| ApiError::Malformed(format!("{}: {}", what, e)))
}

pub(crate) fn decode_list<T: DeserializeOwned>(
  body: &Value,
  fields: &[&str],
  what: &str,
) -> Result<Vec<T>> {
  let items = list_field(body, fields)
    .ok_or_else(|| ApiError::Malformed(format!("{}: expected a list", what)))?;
  items.iter().map(|item| decode(item, what)).collect()
}

/// Ids end up in URL paths; reject anything that would change the path.
pub(crate) fn require_id<'a>(field: &'static str, id: &'a str) -> Result<&'a str> {
  let id = id.trim();
  if id.is_empty() {
    return Err(ApiError::validation(field, "is required"));
  }
  if id
    .chars()
    .any(|c| c == '/' || c == '?' || c == '#' || c.is_whitespace())
  {
    return Err(ApiError::validation(field, "contains invalid characters"));
  }
  Ok(id)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_list_field_shapes() {
    assert_eq!(list_field(&json!([1]), &["items"]).unwrap().len(), 1);
    assert_eq!(
      list_field(&json!({"products": [1, 2]}), &["items", "products"])
        .unwrap()
        .len(),
      2
    );
    assert!(list_field(&json!({"message": "ok"}), &["items"]).is_none());
  }

  #[test]
  fn test_unwrap_field() {
    let wrapped = json!({"product": {"id": "p1"}});
    assert_eq!(unwrap_field(&wrapped, "product"), &json!({"id": "p1"}));
    let bare = json!({"id": "p1"});
    assert_eq!(unwrap_field(&bare, "product"), &bare);
  }

  #[test]
  fn test_require_id() {
    assert_eq!(require_id("id", " p1 ").unwrap(), "p1");
    assert!(require_id("id", "").is_err());
    assert!(require_id("id", "../admin").is_err());
    assert!(require_id("id", "a b").is_err());
  }
}
