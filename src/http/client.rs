//! Shared API client: cache protocol, auth header and error classification.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

use super::request::{ApiRequest, ApiResponse, CACHE_BUST_PARAM};
use super::transport::{Transport, TransportRequest};
use crate::cache::CacheLayer;
use crate::error::{ApiError, Result};
use crate::events::{EventBus, AUTH_LOGOUT};
use crate::storage::Session;

/// Path prefix of the endpoints whose 401s mean "bad credentials", not "session expired".
pub const DEFAULT_AUTH_PREFIX: &str = "/auth/";

/// Normalize an API origin so it ends in exactly one `/api`.
///
/// `http://host:5000`, `http://host:5000/` and `http://host:5000/api/` all
/// become `http://host:5000/api`.
pub fn api_base_url(origin: &str) -> std::result::Result<Url, url::ParseError> {
  let trimmed = origin.trim().trim_end_matches('/');
  let trimmed = trimmed.strip_suffix("/api").unwrap_or(trimmed);
  Url::parse(&format!("{}/api", trimmed.trim_end_matches('/')))
}

/// API client shared by every feature service.
///
/// Cheap to clone; clones share the transport, cache, session and event bus.
#[derive(Clone)]
pub struct ApiClient {
  base: Url,
  transport: Arc<dyn Transport>,
  cache: Arc<CacheLayer>,
  session: Arc<Session>,
  events: EventBus,
  auth_prefix: String,
}

impl ApiClient {
  pub fn new(
    base: Url,
    transport: Arc<dyn Transport>,
    cache: CacheLayer,
    session: Session,
    events: EventBus,
  ) -> Self {
    Self {
      base,
      transport,
      cache: Arc::new(cache),
      session: Arc::new(session),
      events,
      auth_prefix: DEFAULT_AUTH_PREFIX.to_string(),
    }
  }

  pub fn with_auth_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.auth_prefix = prefix.into();
    self
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  pub fn events(&self) -> &EventBus {
    &self.events
  }

  pub fn cache(&self) -> &CacheLayer {
    &self.cache
  }

  /// Drop a cache entry, e.g. after a mutation made it stale.
  pub fn invalidate(&self, key: &str) {
    tracing::debug!(key, "cache invalidate");
    self.cache.invalidate(key);
  }

  /// Send a request through the cache and the transport.
  ///
  /// A fresh cache entry short-circuits the network. Successful cacheable
  /// responses are written through; failures never touch the cache.
  #[tracing::instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
  pub async fn send(&self, request: ApiRequest) -> Result<Value> {
    if let Some(cached) = self.cache.lookup(&request) {
      return Ok(cached);
    }

    let outgoing = TransportRequest {
      method: request.method,
      url: self.url_for(&request)?,
      bearer: self.session.token(),
      body: request.body.clone(),
    };

    let response = self.transport.send(outgoing).await.map_err(|e| {
      tracing::warn!(error = %e, "request failed");
      e
    })?;

    self.settle(&request, response)
  }

  pub async fn get(&self, path: &str) -> Result<Value> {
    self.send(ApiRequest::get(path)).await
  }

  pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
    self.send(ApiRequest::post(path, body)).await
  }

  pub async fn put(&self, path: &str, body: Value) -> Result<Value> {
    self.send(ApiRequest::put(path, body)).await
  }

  pub async fn delete(&self, path: &str) -> Result<Value> {
    self.send(ApiRequest::delete(path)).await
  }

  fn settle(&self, request: &ApiRequest, response: ApiResponse) -> Result<Value> {
    if response.is_success() {
      self.cache.write_through(request, &response.body);
      return Ok(response.body);
    }

    if response.status == 401 && !self.is_auth_endpoint(&request.path) {
      self.force_logout();
      return Err(ApiError::Unauthorized);
    }

    let message = response.error_message();
    tracing::debug!(status = response.status, message = %message, "request rejected");
    Err(ApiError::Business {
      status: response.status,
      message,
    })
  }

  fn is_auth_endpoint(&self, path: &str) -> bool {
    let prefix = self.auth_prefix.trim_end_matches('/');
    path == prefix || path.starts_with(&format!("{}/", prefix))
  }

  /// Tear down the local session and tell everyone about it.
  ///
  /// Cached payloads go too, the same as on a user-initiated logout.
  fn force_logout(&self) {
    tracing::info!("session rejected by server, signing out");
    if let Err(e) = self.session.clear() {
      tracing::warn!(error = %e, "failed to clear session");
    }
    self.cache.clear();
    self
      .events
      .emit(AUTH_LOGOUT, &json!({ "reason": "unauthorized" }));
  }

  fn url_for(&self, request: &ApiRequest) -> Result<Url> {
    let raw = format!("{}{}", self.base.as_str().trim_end_matches('/'), request.path);
    let mut url = Url::parse(&raw).map_err(|e| ApiError::validation("path", e.to_string()))?;

    if !request.query.is_empty() || request.cache_bust {
      let mut pairs = url.query_pairs_mut();
      for (name, value) in &request.query {
        pairs.append_pair(name, value);
      }
      if request.cache_bust {
        pairs.append_pair(CACHE_BUST_PARAM, &Utc::now().timestamp_millis().to_string());
      }
    }

    Ok(url)
  }
}
