//! In-process publish/subscribe bus for cross-component notifications.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

pub const ORDER_STATUS_UPDATED: &str = "order-status-updated";
pub const AUTH_LOGOUT: &str = "auth-logout";
pub const WISHLIST_UPDATED: &str = "wishlist-updated";
pub const PRODUCTS_CHANGED: &str = "products-changed";
pub const USERS_CHANGED: &str = "users-changed";

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Registry {
  next_id: u64,
  handlers: HashMap<String, Vec<(u64, Handler)>>,
}

/// Named-event bus. Clones share the same subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
  registry: Arc<Mutex<Registry>>,
}

impl EventBus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Subscribe `handler` to `event`.
  pub fn on<F>(&self, event: &str, handler: F) -> Subscription
  where
    F: Fn(&Value) + Send + Sync + 'static,
  {
    let id = match self.registry.lock() {
      Ok(mut registry) => {
        registry.next_id += 1;
        let id = registry.next_id;
        registry
          .handlers
          .entry(event.to_string())
          .or_default()
          .push((id, Arc::new(handler)));
        id
      }
      Err(_) => 0,
    };

    Subscription {
      registry: Arc::downgrade(&self.registry),
      event: event.to_string(),
      id,
    }
  }

  /// Invoke every current subscriber of `event`, in subscription order.
  ///
  /// Handlers run after the registry lock is released, so they may subscribe,
  /// unsubscribe or emit themselves. Returns how many handlers ran.
  pub fn emit(&self, event: &str, payload: &Value) -> usize {
    let handlers: Vec<Handler> = match self.registry.lock() {
      Ok(registry) => registry
        .handlers
        .get(event)
        .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
        .unwrap_or_default(),
      Err(_) => return 0,
    };

    tracing::trace!(event, subscribers = handlers.len(), "emit");
    for handler in &handlers {
      handler(payload);
    }
    handlers.len()
  }

  /// Drop every subscriber of `event`.
  pub fn off(&self, event: &str) {
    if let Ok(mut registry) = self.registry.lock() {
      registry.handlers.remove(event);
    }
  }

  pub fn subscriber_count(&self, event: &str) -> usize {
    self
      .registry
      .lock()
      .map(|r| r.handlers.get(event).map_or(0, Vec::len))
      .unwrap_or(0)
  }
}

/// Handle returned by [`EventBus::on`].
///
/// Dropping it keeps the handler registered; call [`Subscription::unsubscribe`].
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
  registry: Weak<Mutex<Registry>>,
  event: String,
  id: u64,
}

impl Subscription {
  pub fn unsubscribe(self) {
    let Some(shared) = self.registry.upgrade() else {
      return;
    };
    let Ok(mut registry) = shared.lock() else {
      return;
    };
    if let Some(handlers) = registry.handlers.get_mut(&self.event) {
      handlers.retain(|(id, _)| *id != self.id);
      if handlers.is_empty() {
        registry.handlers.remove(&self.event);
      }
    }
  }
}
