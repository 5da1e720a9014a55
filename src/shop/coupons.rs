//! Coupon validation, discount calculation and the coupon endpoints.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{decode, decode_list, unwrap_field};
use crate::error::{ApiError, Result};
use crate::http::{ApiClient, ApiRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
  Percentage,
  Fixed,
}

fn default_active() -> bool {
  true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
  pub code: String,
  pub discount_type: DiscountType,
  #[serde(with = "rust_decimal::serde::float")]
  pub discount_value: Decimal,
  #[serde(default, with = "rust_decimal::serde::float_option")]
  pub min_order_amount: Option<Decimal>,
  /// Cap for percentage discounts.
  #[serde(default, with = "rust_decimal::serde::float_option")]
  pub max_discount_amount: Option<Decimal>,
  #[serde(default)]
  pub valid_from: Option<DateTime<Utc>>,
  #[serde(default)]
  pub valid_until: Option<DateTime<Utc>>,
  #[serde(default = "default_active")]
  pub is_active: bool,
  #[serde(default)]
  pub usage_limit: Option<u32>,
  #[serde(default)]
  pub used_count: u32,
}

/// Trim and upper-case a code, rejecting ones the server would never accept.
pub fn normalize_code(code: &str) -> Result<String> {
  let code = code.trim().to_uppercase();
  if code.is_empty() {
    return Err(ApiError::validation("code", "Please enter a coupon code"));
  }
  if !(3..=20).contains(&code.chars().count()) {
    return Err(ApiError::validation(
      "code",
      "Coupon code must be 3 to 20 characters",
    ));
  }
  if !code
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
  {
    return Err(ApiError::validation(
      "code",
      "Coupon code may only contain letters, digits, '-' and '_'",
    ));
  }
  Ok(code)
}

/// Checks an admin coupon form before it is sent.
pub fn validate_draft(coupon: &Coupon) -> Result<()> {
  normalize_code(&coupon.code)?;

  if coupon.discount_value <= Decimal::ZERO {
    return Err(ApiError::validation(
      "discountValue",
      "Discount must be greater than zero",
    ));
  }
  if coupon.discount_type == DiscountType::Percentage
    && coupon.discount_value > Decimal::ONE_HUNDRED
  {
    return Err(ApiError::validation(
      "discountValue",
      "Percentage discount cannot exceed 100",
    ));
  }
  if coupon.min_order_amount.is_some_and(|m| m < Decimal::ZERO) {
    return Err(ApiError::validation(
      "minOrderAmount",
      "Minimum order amount cannot be negative",
    ));
  }
  if coupon.max_discount_amount.is_some_and(|m| m <= Decimal::ZERO) {
    return Err(ApiError::validation(
      "maxDiscountAmount",
      "Maximum discount must be greater than zero",
    ));
  }
  if let (Some(from), Some(until)) = (coupon.valid_from, coupon.valid_until) {
    if from >= until {
      return Err(ApiError::validation(
        "validUntil",
        "End date must be after start date",
      ));
    }
  }
  Ok(())
}

/// Discount `coupon` gives on `subtotal` at `now`, rounded to cents.
///
/// Never more than the subtotal.
pub fn discount_for(coupon: &Coupon, subtotal: Decimal, now: DateTime<Utc>) -> Result<Decimal> {
  if !coupon.is_active {
    return Err(ApiError::validation("code", "This coupon is no longer active"));
  }
  if coupon.valid_from.is_some_and(|from| now < from) {
    return Err(ApiError::validation("code", "This coupon is not valid yet"));
  }
  if coupon.valid_until.is_some_and(|until| now > until) {
    return Err(ApiError::validation("code", "This coupon has expired"));
  }
  if coupon
    .usage_limit
    .is_some_and(|limit| coupon.used_count >= limit)
  {
    return Err(ApiError::validation(
      "code",
      "This coupon has reached its usage limit",
    ));
  }
  if let Some(min) = coupon.min_order_amount {
    if subtotal < min {
      return Err(ApiError::validation(
        "code",
        format!("Minimum order amount is {}", min.round_dp(2)),
      ));
    }
  }

  let discount = match coupon.discount_type {
    DiscountType::Percentage => {
      let raw = subtotal * coupon.discount_value / Decimal::ONE_HUNDRED;
      coupon.max_discount_amount.map_or(raw, |cap| raw.min(cap))
    }
    DiscountType::Fixed => coupon.discount_value,
  };

  Ok(discount.min(subtotal).max(Decimal::ZERO).round_dp(2))
}

/// A coupon accepted for a cart.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCoupon {
  pub code: String,
  /// `None` when the server sent a discount but coupon details we couldn't read.
  pub coupon: Option<Coupon>,
  pub discount: Decimal,
  pub total: Decimal,
}

#[derive(Clone)]
pub struct Coupons {
  client: ApiClient,
}

impl Coupons {
  pub fn new(client: ApiClient) -> Self {
    Self { client }
  }

  /// Check `code` against the server for a cart worth `subtotal`.
  ///
  /// The server's discount wins when it sends one, even if the coupon itself
  /// doesn't decode. Otherwise it's computed locally from the returned coupon.
  pub async fn apply(&self, code: &str, subtotal: Decimal) -> Result<AppliedCoupon> {
    let code = normalize_code(code)?;
    if subtotal <= Decimal::ZERO {
      return Err(ApiError::validation("subtotal", "Your cart is empty"));
    }

    let body = self
      .client
      .post(
        "/coupons/apply",
        json!({ "code": code, "cartTotal": decimal_to_json(subtotal) }),
      )
      .await?;

    let coupon = decode::<Coupon>(unwrap_field(&body, "coupon"), "coupon");
    let (coupon, discount) = match (coupon, server_discount(&body)) {
      (coupon, Some(discount)) => {
        if let Err(e) = &coupon {
          tracing::warn!(error = %e, "coupon details unreadable, using server discount");
        }
        (coupon.ok(), discount.min(subtotal).max(Decimal::ZERO).round_dp(2))
      }
      (Ok(coupon), None) => {
        let discount = discount_for(&coupon, subtotal, Utc::now())?;
        (Some(coupon), discount)
      }
      (Err(e), None) => return Err(e),
    };

    Ok(AppliedCoupon {
      code,
      coupon,
      discount,
      total: subtotal - discount,
    })
  }

  /// All coupons, straight from the server.
  pub async fn list(&self) -> Result<Vec<Coupon>> {
    let body = self
      .client
      .send(ApiRequest::get("/admin/coupons").fresh())
      .await?;
    decode_list(&body, &["coupons", "items"], "coupon list")
  }

  pub async fn create(&self, draft: &Coupon) -> Result<Coupon> {
    validate_draft(draft)?;
    let mut draft = draft.clone();
    draft.code = normalize_code(&draft.code)?;

    let payload = serde_json::to_value(&draft)
      .map_err(|e| ApiError::Malformed(format!("coupon: {}", e)))?;
    let body = self.client.post("/admin/coupons", payload).await?;
    decode(unwrap_field(&body, "coupon"), "coupon")
  }
}

/// `discount` or `discountAmount` from an apply response.
fn server_discount(body: &Value) -> Option<Decimal> {
  ["discount", "discountAmount"]
    .iter()
    .find_map(|field| body.get(*field))
    .and_then(|v| <Decimal as Deserialize>::deserialize(v).ok())
}

fn decimal_to_json(value: Decimal) -> Value {
  value.round_dp(2).to_f64().map_or(Value::Null, Value::from)
}
