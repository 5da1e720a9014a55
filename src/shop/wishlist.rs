//! Wishlist with optimistic add/remove.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{list_field, require_id};
use crate::error::{ApiError, Result};
use crate::events::WISHLIST_UPDATED;
use crate::http::ApiClient;
use crate::optimistic::{MutationCommand, OptimisticCollection, Phase, Settlement};

/// Client-side projection of a wishlist entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
  pub product_id: String,
  /// Whatever part of the product the caller or server had at hand.
  #[serde(default)]
  pub product_data: Value,
}

impl WishlistItem {
  pub fn new(product_id: impl Into<String>, product_data: Value) -> Self {
    Self {
      product_id: product_id.into(),
      product_data,
    }
  }

  /// Accepts `"p1"`, `{ "productId": .. }`, `{ "product": { "_id": .. } }` or a bare product.
  fn from_value(value: &Value) -> Option<Self> {
    if let Some(id) = value.as_str() {
      return Some(Self::new(id, Value::Null));
    }

    if let Some(id) = value.get("productId").and_then(Value::as_str) {
      let data = value.get("product").cloned().unwrap_or(Value::Null);
      return Some(Self::new(id, data));
    }

    if let Some(product) = value.get("product").filter(|p| p.is_object()) {
      return product_id_of(product).map(|id| Self::new(id, product.clone()));
    }

    product_id_of(value).map(|id| Self::new(id, value.clone()))
  }
}

fn product_id_of(value: &Value) -> Option<&str> {
  value
    .get("_id")
    .or_else(|| value.get("id"))
    .and_then(Value::as_str)
}

/// Server collection from a wishlist response, `None` if the shape is off.
fn parse_items(body: &Value) -> Option<Vec<WishlistItem>> {
  let items = list_field(body, &["wishlist", "items", "products"])?;
  items.iter().map(WishlistItem::from_value).collect()
}

fn settle_with(body: &Value) -> Settlement<WishlistItem> {
  match parse_items(body) {
    Some(items) => Settlement::Confirm(items),
    None => Settlement::KeepCurrent,
  }
}

struct AddItem(WishlistItem);

impl MutationCommand<WishlistItem> for AddItem {
  fn apply(&self, state: &[WishlistItem]) -> Vec<WishlistItem> {
    let mut next = state.to_vec();
    if !next.iter().any(|item| item.product_id == self.0.product_id) {
      next.push(self.0.clone());
    }
    next
  }
}

struct RemoveItem(String);

impl MutationCommand<WishlistItem> for RemoveItem {
  fn apply(&self, state: &[WishlistItem]) -> Vec<WishlistItem> {
    state
      .iter()
      .filter(|item| item.product_id != self.0)
      .cloned()
      .collect()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddStatus {
  Added,
  /// Already in the local list; nothing was sent.
  AlreadyPresent,
  /// The server already had it; local list left as it was.
  AlreadyOnServer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveStatus {
  Removed,
  /// Not in the local list; nothing was sent.
  NotPresent,
}

/// The signed-in user's wishlist. Clones share the same list.
#[derive(Clone)]
pub struct Wishlist {
  client: ApiClient,
  items: OptimisticCollection<WishlistItem>,
}

impl Wishlist {
  pub fn new(client: ApiClient) -> Self {
    Self {
      client,
      items: OptimisticCollection::default(),
    }
  }

  pub fn items(&self) -> Vec<WishlistItem> {
    self.items.items()
  }

  pub fn product_ids(&self) -> Vec<String> {
    self.items().into_iter().map(|i| i.product_id).collect()
  }

  /// Visible list, pending changes included.
  pub fn contains(&self, product_id: &str) -> bool {
    self.items.any(|item| item.product_id == product_id)
  }

  /// Whether the server has confirmed `product_id` is in the list.
  pub fn is_saved(&self, product_id: &str) -> bool {
    self
      .items
      .any_confirmed(|item| item.product_id == product_id)
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn phase(&self) -> Phase {
    self.items.phase()
  }

  /// Load the server list. A response without a list leaves the local one alone.
  pub async fn load(&self) -> Result<Vec<WishlistItem>> {
    let body = self.client.get("/wishlist").await?;
    match parse_items(&body) {
      Some(items) => self.items.replace(items),
      None => tracing::warn!("wishlist response had no item list, keeping local state"),
    }
    Ok(self.items())
  }

  /// Add a product, showing it right away.
  ///
  /// Only a product already in the confirmed list is skipped without a
  /// request. One that is merely pending from another add is sent again and
  /// the server's answer settles it.
  pub async fn add(&self, product_id: &str, product_data: Value) -> Result<AddStatus> {
    let product_id = require_id("product", product_id)?.to_string();
    if self.is_saved(&product_id) {
      tracing::info!(product_id = %product_id, "already in wishlist");
      return Ok(AddStatus::AlreadyPresent);
    }

    let command = AddItem(WishlistItem::new(product_id.clone(), product_data));
    let client = self.client.clone();
    let body = json!({ "productId": product_id });

    let settled = self
      .items
      .execute(&command, || async move {
        match client.post("/wishlist", body).await {
          Ok(response) => Ok(settle_with(&response)),
          Err(e) if e.is_already_exists() => Ok(Settlement::Restore),
          Err(e) => Err(e),
        }
      })
      .await?;

    if settled.phase == Phase::RolledBack {
      tracing::info!(product_id = %product_id, "server already had product in wishlist");
      return Ok(AddStatus::AlreadyOnServer);
    }

    self.notify("added", &product_id);
    Ok(AddStatus::Added)
  }

  pub async fn remove(&self, product_id: &str) -> Result<RemoveStatus> {
    let product_id = require_id("product", product_id)?.to_string();
    if !self.contains(&product_id) {
      return Ok(RemoveStatus::NotPresent);
    }

    let command = RemoveItem(product_id.clone());
    let client = self.client.clone();
    let path = format!("/wishlist/{}", product_id);

    self
      .items
      .execute(&command, || async move {
        let response = client.delete(&path).await?;
        Ok::<_, ApiError>(settle_with(&response))
      })
      .await?;

    self.notify("removed", &product_id);
    Ok(RemoveStatus::Removed)
  }

  fn notify(&self, action: &str, product_id: &str) {
    self.client.events().emit(
      WISHLIST_UPDATED,
      &json!({ "action": action, "productId": product_id, "count": self.len() }),
    );
  }
}
