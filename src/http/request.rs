use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

impl Method {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Get => "GET",
      Self::Post => "POST",
      Self::Put => "PUT",
      Self::Patch => "PATCH",
      Self::Delete => "DELETE",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Query parameter appended by [`ApiRequest::cache_bust`].
pub const CACHE_BUST_PARAM: &str = "_t";

/// A request against the API, relative to the `/api` base.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
  pub method: Method,
  /// Path below the base, always starting with `/`.
  pub path: String,
  pub query: Vec<(String, String)>,
  pub body: Option<Value>,
  /// Skip the client cache entirely (no read, no write-through).
  pub bypass_cache: bool,
  /// Append a timestamp param so servers and CDNs can't serve a cached copy.
  pub cache_bust: bool,
}

impl ApiRequest {
  /// A query string written into `path` (`/products?page=2`) is moved into
  /// [`ApiRequest::query`], so the path never carries one.
  pub fn new(method: Method, path: impl Into<String>) -> Self {
    let path = path.into();
    let (path, query) = match path.split_once('?') {
      Some((path, raw)) => (
        path.to_string(),
        url::form_urlencoded::parse(raw.as_bytes())
          .into_owned()
          .collect(),
      ),
      None => (path, Vec::new()),
    };
    let path = if path.starts_with('/') {
      path
    } else {
      format!("/{}", path)
    };

    Self {
      method,
      path,
      query,
      body: None,
      bypass_cache: false,
      cache_bust: false,
    }
  }

  pub fn get(path: impl Into<String>) -> Self {
    Self::new(Method::Get, path)
  }

  pub fn post(path: impl Into<String>, body: Value) -> Self {
    Self::new(Method::Post, path).body(body)
  }

  pub fn put(path: impl Into<String>, body: Value) -> Self {
    Self::new(Method::Put, path).body(body)
  }

  pub fn patch(path: impl Into<String>, body: Value) -> Self {
    Self::new(Method::Patch, path).body(body)
  }

  pub fn delete(path: impl Into<String>) -> Self {
    Self::new(Method::Delete, path)
  }

  pub fn body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
    self.query.push((name.into(), value.to_string()));
    self
  }

  pub fn bypass_cache(mut self) -> Self {
    self.bypass_cache = true;
    self
  }

  pub fn cache_bust(mut self) -> Self {
    self.cache_bust = true;
    self
  }

  /// Force a fresh read: skip the client cache and defeat intermediaries.
  pub fn fresh(self) -> Self {
    self.bypass_cache().cache_bust()
  }
}

/// What came back from the transport: any HTTP status, body parsed as JSON when possible.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
  pub status: u16,
  pub body: Value,
}

impl ApiResponse {
  pub fn new(status: u16, body: Value) -> Self {
    Self { status, body }
  }

  pub fn ok(body: Value) -> Self {
    Self::new(200, body)
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Human readable message from an error body.
  pub fn error_message(&self) -> String {
    match &self.body {
      Value::Object(map) => ["message", "error", "msg"]
        .iter()
        .find_map(|field| map.get(*field).and_then(Value::as_str))
        .map(String::from),
      Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
      _ => None,
    }
    .unwrap_or_else(|| format!("Request failed with status {}", self.status))
  }
}
