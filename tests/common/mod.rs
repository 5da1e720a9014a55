#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use url::Url;

use storefront::cache::{CacheLayer, ManualClock, MemoryStore, RuleTable};
use storefront::error::{ApiError, Result};
use storefront::events::EventBus;
use storefront::http::{ApiClient, ApiResponse, Transport, TransportRequest};
use storefront::storage::{Session, SqliteStorage};

type Hook = Arc<dyn Fn(&TransportRequest) + Send + Sync>;

/// Transport that answers from a script and remembers what it was asked.
#[derive(Default)]
pub struct ScriptedTransport {
  responses: Mutex<VecDeque<Result<ApiResponse>>>,
  requests: Mutex<Vec<TransportRequest>>,
  on_send: Mutex<Option<Hook>>,
}

impl ScriptedTransport {
  pub fn respond(&self, status: u16, body: Value) {
    self
      .responses
      .lock()
      .unwrap()
      .push_back(Ok(ApiResponse::new(status, body)));
  }

  pub fn fail(&self, error: ApiError) {
    self.responses.lock().unwrap().push_back(Err(error));
  }

  /// Runs inside `send`, i.e. while the caller is awaiting the response.
  pub fn on_send(&self, hook: impl Fn(&TransportRequest) + Send + Sync + 'static) {
    *self.on_send.lock().unwrap() = Some(Arc::new(hook));
  }

  pub fn calls(&self) -> usize {
    self.requests.lock().unwrap().len()
  }

  pub fn requests(&self) -> Vec<TransportRequest> {
    self.requests.lock().unwrap().clone()
  }

  pub fn last_request(&self) -> TransportRequest {
    self
      .requests
      .lock()
      .unwrap()
      .last()
      .cloned()
      .expect("no request was sent")
  }
}

impl Transport for ScriptedTransport {
  fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<ApiResponse>> {
    let hook = self.on_send.lock().unwrap().clone();
    self.requests.lock().unwrap().push(request.clone());
    if let Some(hook) = hook {
      hook(&request);
    }

    let response = self
      .responses
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| Err(ApiError::Network(format!("unscripted request to {}", request.url))));
    futures::future::ready(response).boxed()
  }
}

pub struct Harness {
  pub client: ApiClient,
  pub transport: Arc<ScriptedTransport>,
  pub clock: ManualClock,
}

impl Harness {
  /// Client with the default rules, an in-memory session and a manual clock.
  pub fn new() -> Self {
    let transport = Arc::new(ScriptedTransport::default());
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    let cache = CacheLayer::new(
      Arc::new(MemoryStore::with_clock(clock.clone())),
      RuleTable::storefront_defaults().unwrap(),
    );
    let session = Session::new(SqliteStorage::open_in_memory().unwrap());

    let client = ApiClient::new(
      Url::parse("http://shop.test/api").unwrap(),
      transport.clone(),
      cache,
      session,
      EventBus::new(),
    );

    Self {
      client,
      transport,
      clock,
    }
  }

  pub fn signed_in() -> Self {
    let harness = Self::new();
    harness.client.session().set_token("test-token").unwrap();
    harness
  }

  /// Count how often `event` fires from now on.
  pub fn count_events(&self, event: &str) -> Arc<Mutex<Vec<Value>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _ = self.client.events().on(event, move |payload| {
      sink.lock().unwrap().push(payload.clone());
    });
    seen
  }
}
