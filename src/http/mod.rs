//! HTTP plumbing: request descriptors, the wire transport and the shared client.

mod client;
mod request;
mod transport;

pub use client::{api_base_url, ApiClient, DEFAULT_AUTH_PREFIX};
pub use request::{ApiRequest, ApiResponse, Method, CACHE_BUST_PARAM};
pub use transport::{ReqwestTransport, Transport, TransportRequest};
