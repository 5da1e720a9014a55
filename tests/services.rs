mod common;

use common::Harness;
use rust_decimal::Decimal;
use serde_json::json;
use storefront::error::ApiError;
use storefront::events::{AUTH_LOGOUT, ORDER_STATUS_UPDATED, PRODUCTS_CHANGED};
use storefront::http::Method;
use storefront::shop::admin::Admin;
use storefront::shop::auth::Auth;
use storefront::shop::catalog::{Catalog, ProductQuery};
use storefront::shop::coupons::Coupons;
use storefront::shop::orders::{OrderStatus, Orders};

#[tokio::test]
async fn test_product_listing_and_refresh() {
  let h = Harness::new();
  let catalog = Catalog::new(h.client.clone());
  h.transport.respond(
    200,
    json!({"products": [{"_id": "p1", "name": "Tea", "price": 4.5}], "page": 1, "pages": 3}),
  );
  h.transport.respond(200, json!({"products": [], "page": 1, "pages": 1}));

  let query = ProductQuery::default();
  let first = catalog.products(&query, false).await.unwrap();
  let cached = catalog.products(&query, false).await.unwrap();
  assert_eq!(h.transport.calls(), 1);
  assert_eq!(first, cached);
  assert_eq!(first.pages, 3);
  assert_eq!(first.products[0].price, Decimal::new(45, 1));

  let refreshed = catalog.products(&query, true).await.unwrap();
  assert_eq!(h.transport.calls(), 2);
  assert!(refreshed.products.is_empty());
}

#[tokio::test]
async fn test_malformed_product_is_reported() {
  let h = Harness::new();
  let catalog = Catalog::new(h.client.clone());
  h.transport.respond(200, json!({"product": {"_id": "p1"}}));

  let err = catalog.product("p1").await.unwrap_err();

  assert!(matches!(err, ApiError::Malformed(_)));
}

#[tokio::test]
async fn test_categories_accept_both_shapes() {
  let h = Harness::new();
  let catalog = Catalog::new(h.client.clone());
  h.transport.respond(200, json!(["Tea", {"name": "Mugs"}]));

  assert_eq!(catalog.categories().await.unwrap(), vec!["Tea", "Mugs"]);
}

#[tokio::test]
async fn test_login_stores_token_and_admin_session() {
  let h = Harness::new();
  let auth = Auth::new(h.client.clone());
  h.transport.respond(
    200,
    json!({
      "token": "jwt-123",
      "user": {"_id": "u1", "name": "Ada", "email": "ada@shop.test", "isAdmin": true}
    }),
  );

  let profile = auth.login("ada@shop.test", "pw").await.unwrap();

  assert!(profile.is_admin);
  assert!(auth.is_signed_in());
  assert!(auth.is_admin());
  assert_eq!(h.client.session().token().as_deref(), Some("jwt-123"));
}

#[tokio::test]
async fn test_login_validates_before_sending() {
  let h = Harness::new();
  let auth = Auth::new(h.client.clone());

  assert!(auth.login("not-an-email", "pw").await.is_err());
  assert!(auth.login("a@b.c", "").await.is_err());
  assert_eq!(h.transport.calls(), 0);
}

#[tokio::test]
async fn test_logout_clears_session_and_cache() {
  let h = Harness::signed_in();
  let auth = Auth::new(h.client.clone());
  let logouts = h.count_events(AUTH_LOGOUT);
  h.transport.respond(200, json!([]));
  h.transport.respond(200, json!([]));

  h.client.get("/categories").await.unwrap();
  auth.logout().unwrap();
  h.client.get("/categories").await.unwrap();

  assert!(!auth.is_signed_in());
  assert_eq!(h.transport.calls(), 2);
  assert_eq!(logouts.lock().unwrap()[0]["reason"], "user");
}

#[tokio::test]
async fn test_featuring_a_product_invalidates_product_caches() {
  let h = Harness::signed_in();
  let admin = Admin::new(h.client.clone());
  let changes = h.count_events(PRODUCTS_CHANGED);
  h.transport.respond(200, json!({"products": []}));
  h.transport.respond(200, json!({"message": "updated"}));
  h.transport.respond(200, json!({"products": [{"_id": "p1"}]}));

  h.client.get("/products/featured").await.unwrap();
  admin.set_featured("p1", true).await.unwrap();
  let featured = h.client.get("/products/featured").await.unwrap();

  assert_eq!(h.transport.calls(), 3);
  assert_eq!(featured["products"][0]["_id"], "p1");
  let put = &h.transport.requests()[1];
  assert_eq!(put.method, Method::Put);
  assert_eq!(put.url.path(), "/api/admin/products/p1/featured");
  assert_eq!(put.body, Some(json!({"isFeatured": true})));
  assert_eq!(changes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_deleting_a_user_reloads_the_list() {
  let h = Harness::signed_in();
  let admin = Admin::new(h.client.clone());
  let user = |id: &str| json!({"_id": id, "name": id, "email": format!("{}@shop.test", id)});
  h.transport.respond(200, json!([user("u1"), user("u2")]));
  h.transport.respond(200, json!({"message": "User removed"}));
  h.transport.respond(200, json!([user("u1")]));

  assert_eq!(admin.users(false).await.unwrap().len(), 2);
  let remaining = admin.delete_user("u2").await.unwrap();

  assert_eq!(remaining.len(), 1);
  assert_eq!(h.transport.calls(), 3);
}

fn order(status: &str) -> serde_json::Value {
  json!({"_id": "o1", "status": status, "orderItems": [], "totalPrice": 20})
}

#[tokio::test]
async fn test_order_status_update_emits_event() {
  let h = Harness::signed_in();
  let orders = Orders::new(h.client.clone());
  let updates = h.count_events(ORDER_STATUS_UPDATED);
  h.transport.respond(200, order("processing"));
  h.transport.respond(200, json!({"order": order("shipped")}));

  let updated = orders
    .update_status("o1", OrderStatus::Shipped)
    .await
    .unwrap();

  assert_eq!(updated.status, OrderStatus::Shipped);
  assert_eq!(
    h.transport.last_request().url.path(),
    "/api/admin/orders/o1/status"
  );
  assert_eq!(
    updates.lock().unwrap().as_slice(),
    &[json!({"orderId": "o1", "status": "shipped"})]
  );
}

#[tokio::test]
async fn test_backwards_order_status_is_refused() {
  let h = Harness::signed_in();
  let orders = Orders::new(h.client.clone());
  h.transport.respond(200, order("delivered"));

  let err = orders
    .update_status("o1", OrderStatus::Processing)
    .await
    .unwrap_err();

  assert!(matches!(err, ApiError::Validation { field: "status", .. }));
  assert_eq!(h.transport.calls(), 1);
}

#[tokio::test]
async fn test_tracking_reads_fresh_status() {
  let h = Harness::signed_in();
  let orders = Orders::new(h.client.clone());
  h.transport.respond(200, order("shipped"));

  let tracking = orders.track("o1").await.unwrap();

  assert_eq!((tracking.step, tracking.total_steps), (3, 4));
  assert!(h
    .transport
    .last_request()
    .url
    .query_pairs()
    .any(|(k, _)| k == "_t"));
}

#[tokio::test]
async fn test_coupon_prefers_server_discount() {
  let h = Harness::signed_in();
  let coupons = Coupons::new(h.client.clone());
  h.transport.respond(
    200,
    json!({
      "coupon": {"code": "SAVE10", "discountType": "percentage", "discountValue": 10},
      "discount": 7.5
    }),
  );

  let applied = coupons.apply(" save10 ", Decimal::from(50)).await.unwrap();

  assert_eq!(applied.discount, Decimal::new(75, 1));
  assert_eq!(applied.total, Decimal::new(425, 1));
  assert_eq!(
    h.transport.last_request().body,
    Some(json!({"code": "SAVE10", "cartTotal": 50.0}))
  );
}

#[tokio::test]
async fn test_coupon_discount_computed_locally_without_server_amount() {
  let h = Harness::signed_in();
  let coupons = Coupons::new(h.client.clone());
  h.transport.respond(
    200,
    json!({"code": "FIVE", "discountType": "fixed", "discountValue": 5}),
  );

  let applied = coupons.apply("five", Decimal::from(30)).await.unwrap();

  assert_eq!(applied.discount, Decimal::from(5));
  assert_eq!(applied.total, Decimal::from(25));
}

#[tokio::test]
async fn test_coupon_uses_server_discount_when_details_are_unreadable() {
  let h = Harness::signed_in();
  let coupons = Coupons::new(h.client.clone());
  h.transport.respond(
    200,
    json!({"coupon": {"code": "SAVE10", "discountType": "mystery"}, "discountAmount": 4}),
  );

  let applied = coupons.apply("save10", Decimal::from(20)).await.unwrap();

  assert_eq!(applied.code, "SAVE10");
  assert_eq!(applied.coupon, None);
  assert_eq!(applied.discount, Decimal::from(4));
  assert_eq!(applied.total, Decimal::from(16));
}

#[tokio::test]
async fn test_coupon_without_details_or_discount_is_malformed() {
  let h = Harness::signed_in();
  let coupons = Coupons::new(h.client.clone());
  h.transport.respond(200, json!({"message": "ok"}));

  let err = coupons.apply("save10", Decimal::from(20)).await.unwrap_err();

  assert!(matches!(err, ApiError::Malformed(_)));
}
