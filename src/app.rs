use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheLayer, CacheStore, MemoryStore, NoopStore};
use crate::config::Config;
use crate::events::{EventBus, AUTH_LOGOUT};
use crate::http::{ApiClient, ReqwestTransport, Transport};
use crate::shop::admin::Admin;
use crate::shop::auth::Auth;
use crate::shop::catalog::Catalog;
use crate::shop::coupons::Coupons;
use crate::shop::orders::Orders;
use crate::shop::wishlist::Wishlist;
use crate::storage::{Session, SqliteStorage};

/// Everything a front end needs, wired once at startup.
pub struct App {
  pub config: Config,
  pub client: ApiClient,
  pub catalog: Catalog,
  pub wishlist: Wishlist,
  pub coupons: Coupons,
  pub orders: Orders,
  pub auth: Auth,
  pub admin: Admin,
}

impl App {
  /// Build the app against the real backend and on-disk storage.
  pub fn new(config: Config) -> Result<Self> {
    let storage = SqliteStorage::open()?;
    let transport = ReqwestTransport::new(Duration::from_secs(config.api.timeout_secs))?;
    Self::with_parts(config, Arc::new(transport), storage)
  }

  /// Build the app from an already opened storage and any transport.
  pub fn with_parts(
    config: Config,
    transport: Arc<dyn Transport>,
    storage: SqliteStorage,
  ) -> Result<Self> {
    let store: Arc<dyn CacheStore> = if config.cache.enabled {
      Arc::new(MemoryStore::new())
    } else {
      Arc::new(NoopStore)
    };
    let cache = CacheLayer::new(store, config.rule_table()?);

    let events = EventBus::new();
    // Lives as long as the bus.
    let _ = events.on(AUTH_LOGOUT, |payload| {
      tracing::info!(%payload, "session ended");
    });

    let client = ApiClient::new(
      config.base_url()?,
      transport,
      cache,
      Session::new(storage),
      events,
    )
    .with_auth_prefix(config.api.auth_path_prefix.clone());

    tracing::debug!(base = %client.base_url(), cache = config.cache.enabled, "app ready");

    Ok(Self {
      catalog: Catalog::new(client.clone()),
      wishlist: Wishlist::new(client.clone()),
      coupons: Coupons::new(client.clone()),
      orders: Orders::new(client.clone()),
      auth: Auth::new(client.clone()),
      admin: Admin::new(client.clone()),
      client,
      config,
    })
  }

  pub fn events(&self) -> &EventBus {
    self.client.events()
  }
}
