//! Storefront client core: a rule-driven request cache, optimistic
//! collection updates and session-aware error/event propagation.

pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod logging;
pub mod optimistic;
pub mod shop;
pub mod storage;

pub use app::App;
pub use config::Config;
pub use error::{ApiError, Result};
pub use events::EventBus;
pub use http::{ApiClient, ApiRequest};
