//! Product catalog reads. All of these go through the request cache.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decode, decode_list, list_field, require_id, unwrap_field};
use crate::error::Result;
use crate::http::{ApiClient, ApiRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  #[serde(with = "rust_decimal::serde::float")]
  pub price: Decimal,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub image: Option<String>,
  #[serde(default, alias = "countInStock")]
  pub stock: Option<u32>,
  #[serde(default)]
  pub is_featured: bool,
}

impl Product {
  pub fn in_stock(&self) -> bool {
    self.stock.map_or(true, |s| s > 0)
  }
}

/// Filters for the product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
  pub page: Option<u32>,
  pub category: Option<String>,
  pub keyword: Option<String>,
}

impl ProductQuery {
  fn to_request(&self) -> ApiRequest {
    let mut request = ApiRequest::get("/products");
    if let Some(page) = self.page {
      request = request.query("page", page);
    }
    if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
      request = request.query("category", category);
    }
    if let Some(keyword) = self.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
      request = request.query("keyword", keyword.trim());
    }
    request
  }
}

/// One page of the product listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPage {
  pub products: Vec<Product>,
  pub page: u32,
  pub pages: u32,
}

#[derive(Clone)]
pub struct Catalog {
  client: ApiClient,
}

impl Catalog {
  pub fn new(client: ApiClient) -> Self {
    Self { client }
  }

  /// List products. `refresh` skips the client cache.
  pub async fn products(&self, query: &ProductQuery, refresh: bool) -> Result<ProductPage> {
    let mut request = query.to_request();
    if refresh {
      request = request.fresh();
    }
    let body = self.client.send(request).await?;

    let products = decode_list(&body, &["products", "items"], "product list")?;
    let page = body.get("page").and_then(Value::as_u64).unwrap_or(1);
    let pages = body.get("pages").and_then(Value::as_u64).unwrap_or(page);

    Ok(ProductPage {
      products,
      page: u32::try_from(page).unwrap_or(u32::MAX),
      pages: u32::try_from(pages).unwrap_or(u32::MAX),
    })
  }

  pub async fn featured(&self) -> Result<Vec<Product>> {
    let body = self.client.get("/products/featured").await?;
    decode_list(&body, &["products", "items"], "featured products")
  }

  pub async fn product(&self, id: &str) -> Result<Product> {
    let id = require_id("product", id)?;
    let body = self.client.get(&format!("/products/{}", id)).await?;
    decode(unwrap_field(&body, "product"), "product")
  }

  /// Category names. Accepts plain strings or `{ "name": .. }` objects.
  pub async fn categories(&self) -> Result<Vec<String>> {
    let body = self.client.get("/categories").await?;
    let items = list_field(&body, &["categories", "items"]).cloned().unwrap_or_default();
    Ok(
      items
        .iter()
        .filter_map(|c| match c {
          Value::String(name) => Some(name.clone()),
          other => other.get("name").and_then(Value::as_str).map(String::from),
        })
        .collect(),
    )
  }
}
