//! Order placement, tracking and admin status updates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

use super::{decode, decode_list, require_id, unwrap_field};
use crate::error::{ApiError, Result};
use crate::events::ORDER_STATUS_UPDATED;
use crate::http::{ApiClient, ApiRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  /// The normal life of an order, in order.
  pub const PROGRESSION: [OrderStatus; 4] = [
    OrderStatus::Pending,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
  ];

  /// Position in [`Self::PROGRESSION`]; `None` for cancelled orders.
  pub fn step(self) -> Option<usize> {
    Self::PROGRESSION.iter().position(|s| *s == self)
  }

  pub fn is_final(self) -> bool {
    matches!(self, Self::Delivered | Self::Cancelled)
  }

  /// Orders only move forward, and can only be cancelled before they ship.
  pub fn can_transition_to(self, next: OrderStatus) -> bool {
    if self == next || self.is_final() {
      return false;
    }
    match next {
      Self::Cancelled => matches!(self, Self::Pending | Self::Processing),
      _ => next.step() > self.step(),
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Processing => "processing",
      Self::Shipped => "shipped",
      Self::Delivered => "delivered",
      Self::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = ApiError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_lowercase().as_str() {
      "pending" => Ok(Self::Pending),
      "processing" => Ok(Self::Processing),
      "shipped" => Ok(Self::Shipped),
      "delivered" => Ok(Self::Delivered),
      "cancelled" | "canceled" => Ok(Self::Cancelled),
      other => Err(ApiError::validation(
        "status",
        format!("Unknown order status '{}'", other),
      )),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
  #[serde(alias = "product")]
  pub product_id: String,
  pub name: String,
  pub quantity: u32,
  #[serde(with = "rust_decimal::serde::float")]
  pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
  pub address: String,
  pub city: String,
  pub postal_code: String,
  pub country: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  #[serde(alias = "_id")]
  pub id: String,
  pub status: OrderStatus,
  #[serde(default, alias = "orderItems")]
  pub items: Vec<OrderLine>,
  #[serde(with = "rust_decimal::serde::float", alias = "totalPrice")]
  pub total: Decimal,
  #[serde(default)]
  pub coupon_code: Option<String>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

/// Checkout payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
  #[serde(rename = "orderItems")]
  pub items: Vec<OrderLine>,
  pub shipping_address: ShippingAddress,
  pub payment_method: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub coupon_code: Option<String>,
}

impl NewOrder {
  pub fn validate(&self) -> Result<()> {
    if self.items.is_empty() {
      return Err(ApiError::validation("orderItems", "Your cart is empty"));
    }
    if let Some(line) = self.items.iter().find(|l| l.quantity == 0) {
      return Err(ApiError::validation(
        "orderItems",
        format!("Quantity for {} must be at least 1", line.name),
      ));
    }
    if self.items.iter().any(|l| l.price < Decimal::ZERO) {
      return Err(ApiError::validation("orderItems", "Prices cannot be negative"));
    }

    let address = &self.shipping_address;
    for (field, value) in [
      ("address", &address.address),
      ("city", &address.city),
      ("postalCode", &address.postal_code),
      ("country", &address.country),
    ] {
      if value.trim().is_empty() {
        return Err(ApiError::validation(field, "is required"));
      }
    }

    if self.payment_method.trim().is_empty() {
      return Err(ApiError::validation("paymentMethod", "is required"));
    }
    Ok(())
  }

  pub fn subtotal(&self) -> Decimal {
    self
      .items
      .iter()
      .map(|l| l.price * Decimal::from(l.quantity))
      .sum()
  }
}

/// Where an order is in its progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracking {
  pub status: OrderStatus,
  /// 1-based step, 0 for cancelled orders.
  pub step: usize,
  pub total_steps: usize,
}

impl Tracking {
  pub fn for_status(status: OrderStatus) -> Self {
    Self {
      status,
      step: status.step().map_or(0, |s| s + 1),
      total_steps: OrderStatus::PROGRESSION.len(),
    }
  }

  pub fn is_cancelled(&self) -> bool {
    self.status == OrderStatus::Cancelled
  }
}

#[derive(Clone)]
pub struct Orders {
  client: ApiClient,
}

impl Orders {
  pub fn new(client: ApiClient) -> Self {
    Self { client }
  }

  pub async fn place(&self, order: &NewOrder) -> Result<Order> {
    order.validate()?;
    let payload =
      serde_json::to_value(order).map_err(|e| ApiError::Malformed(format!("order: {}", e)))?;
    let body = self.client.post("/orders", payload).await?;
    let placed: Order = decode(unwrap_field(&body, "order"), "order")?;
    tracing::info!(order_id = %placed.id, total = %placed.total, "order placed");
    Ok(placed)
  }

  /// The signed-in user's orders, never from any cache.
  pub async fn mine(&self) -> Result<Vec<Order>> {
    let body = self
      .client
      .send(ApiRequest::get("/orders/my-orders").fresh())
      .await?;
    decode_list(&body, &["orders", "items"], "order list")
  }

  pub async fn get(&self, id: &str) -> Result<Order> {
    let id = require_id("order", id)?;
    let body = self
      .client
      .send(ApiRequest::get(format!("/orders/{}", id)).fresh())
      .await?;
    decode(unwrap_field(&body, "order"), "order")
  }

  pub async fn track(&self, id: &str) -> Result<Tracking> {
    Ok(Tracking::for_status(self.get(id).await?.status))
  }

  /// Admin: move an order to `status`.
  ///
  /// The transition is checked against the order's current status first.
  /// Listeners of `order-status-updated` are told on success.
  pub async fn update_status(&self, id: &str, status: OrderStatus) -> Result<Order> {
    let current = self.get(id).await?;
    if !current.status.can_transition_to(status) {
      return Err(ApiError::validation(
        "status",
        format!("Cannot change order from {} to {}", current.status, status),
      ));
    }

    let body = self
      .client
      .put(
        &format!("/admin/orders/{}/status", current.id),
        json!({ "status": status }),
      )
      .await?;

    // Some servers answer with just a message.
    let updated = decode(unwrap_field(&body, "order"), "order").unwrap_or_else(|_| Order {
      status,
      ..current
    });

    self.client.events().emit(
      ORDER_STATUS_UPDATED,
      &json!({ "orderId": updated.id, "status": updated.status }),
    );
    Ok(updated)
  }
}
