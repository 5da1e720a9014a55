//! Wire transport behind the API client.

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::request::{ApiResponse, Method};
use crate::error::{ApiError, Result};

/// A fully resolved outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
  pub method: Method,
  pub url: Url,
  pub bearer: Option<String>,
  pub body: Option<Value>,
}

/// Sends requests over the wire.
///
/// Any HTTP status is a successful send; only failures to get a response at
/// all (connection, timeout) are errors.
pub trait Transport: Send + Sync {
  fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<ApiResponse>>;
}

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl ReqwestTransport {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;
    Ok(Self { client })
  }
}

impl Transport for ReqwestTransport {
  fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<ApiResponse>> {
    async move {
      let method = match request.method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
      };

      let mut builder = self.client.request(method, request.url);
      if let Some(token) = &request.bearer {
        builder = builder.bearer_auth(token);
      }
      if let Some(body) = &request.body {
        builder = builder.json(body);
      }

      let response = builder.send().await.map_err(classify)?;
      let status = response.status().as_u16();
      let text = response.text().await.map_err(classify)?;

      Ok(ApiResponse::new(status, parse_body(&text)))
    }
    .boxed()
  }
}

fn classify(e: reqwest::Error) -> ApiError {
  if e.is_timeout() {
    ApiError::Timeout
  } else {
    ApiError::Network(e.to_string())
  }
}

/// JSON if it parses, the raw text otherwise, null for an empty body.
fn parse_body(text: &str) -> Value {
  if text.trim().is_empty() {
    return Value::Null;
  }
  serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
