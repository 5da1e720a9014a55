mod common;

use common::ScriptedTransport;
use serde_json::json;
use std::sync::Arc;
use storefront::events::AUTH_LOGOUT;
use storefront::storage::SqliteStorage;
use storefront::{App, Config};

fn app(yaml: &str) -> (App, Arc<ScriptedTransport>) {
  let transport = Arc::new(ScriptedTransport::default());
  let config = Config::parse(yaml).unwrap();
  let app = App::with_parts(
    config,
    transport.clone(),
    SqliteStorage::open_in_memory().unwrap(),
  )
  .unwrap();
  (app, transport)
}

#[tokio::test]
async fn test_app_wires_services_to_one_client() {
  let (app, transport) = app("api:\n  origin: http://shop.test/\n");
  transport.respond(200, json!({"wishlist": ["p1"]}));

  assert_eq!(app.client.base_url().as_str(), "http://shop.test/api");
  assert_eq!(app.events().subscriber_count(AUTH_LOGOUT), 1);

  app.wishlist.load().await.unwrap();
  assert_eq!(
    transport.last_request().url.as_str(),
    "http://shop.test/api/wishlist"
  );
}

#[tokio::test]
async fn test_disabled_cache_always_hits_the_network() {
  let (app, transport) = app("api:\n  origin: http://shop.test\ncache:\n  enabled: false\n");
  transport.respond(200, json!([]));
  transport.respond(200, json!([]));

  app.catalog.categories().await.unwrap();
  app.catalog.categories().await.unwrap();

  assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_custom_auth_prefix() {
  let (app, transport) =
    app("api:\n  origin: http://shop.test\n  auth_path_prefix: /users/\n");
  app.client.session().set_token("t").unwrap();
  transport.respond(401, json!({"message": "Wrong password"}));

  let err = app
    .client
    .post("/users/login", json!({}))
    .await
    .unwrap_err();

  assert_eq!(err.status(), Some(401));
  assert_eq!(app.client.session().token().as_deref(), Some("t"));
}
