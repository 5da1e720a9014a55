//! Admin back-office calls: users and featured-product curation.

use serde_json::json;

use super::auth::UserProfile;
use super::{decode_list, require_id};
use crate::error::Result;
use crate::events::{PRODUCTS_CHANGED, USERS_CHANGED};
use crate::http::{ApiClient, ApiRequest};

/// Cache keys that hold product data, see `RuleTable::storefront_defaults`.
const PRODUCT_KEYS: &[&str] = &["products", "featured_products", "admin_products"];

#[derive(Clone)]
pub struct Admin {
  client: ApiClient,
}

impl Admin {
  pub fn new(client: ApiClient) -> Self {
    Self { client }
  }

  /// User list. `refresh` goes around every cache.
  pub async fn users(&self, refresh: bool) -> Result<Vec<UserProfile>> {
    let mut request = ApiRequest::get("/admin/users");
    if refresh {
      request = request.fresh();
    }
    let body = self.client.send(request).await?;
    decode_list(&body, &["users", "items"], "user list")
  }

  /// Delete a user and return the reloaded list.
  pub async fn delete_user(&self, id: &str) -> Result<Vec<UserProfile>> {
    let id = require_id("user", id)?;
    self.client.delete(&format!("/admin/users/{}", id)).await?;

    self.client.invalidate("admin_users");
    self
      .client
      .events()
      .emit(USERS_CHANGED, &json!({ "action": "deleted", "userId": id }));
    self.users(true).await
  }

  /// Mark a product as featured (or not) on the home page.
  pub async fn set_featured(&self, product_id: &str, featured: bool) -> Result<()> {
    let product_id = require_id("product", product_id)?;
    self
      .client
      .put(
        &format!("/admin/products/{}/featured", product_id),
        json!({ "isFeatured": featured }),
      )
      .await?;

    for key in PRODUCT_KEYS {
      self.client.invalidate(key);
    }
    self.client.invalidate(&format!("product_{}", product_id));

    self.client.events().emit(
      PRODUCTS_CHANGED,
      &json!({ "productId": product_id, "isFeatured": featured }),
    );
    tracing::info!(product_id, featured, "featured flag updated");
    Ok(())
  }
}
