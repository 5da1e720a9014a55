//! Error taxonomy for everything that talks to the storefront API.

use thiserror::Error;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Errors surfaced by the API client and the feature services built on it.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Rejected locally before any request was made.
  #[error("{field}: {message}")]
  Validation {
    field: &'static str,
    message: String,
  },

  /// The server answered with a non-success status and (usually) a message.
  #[error("{message}")]
  Business { status: u16, message: String },

  /// 401 outside of the auth endpoints. The session has already been torn down
  /// by the time a caller sees this.
  #[error("session expired, please sign in again")]
  Unauthorized,

  #[error("network error: {0}")]
  Network(String),

  #[error("request timed out")]
  Timeout,

  /// The response did not have the shape we need and there was nothing to fall back to.
  #[error("unexpected response: {0}")]
  Malformed(String),

  #[error("invalid cache rule '{pattern}': {reason}")]
  InvalidRule { pattern: String, reason: String },

  #[error("local storage error: {0}")]
  Storage(#[from] rusqlite::Error),

  #[error("local storage is unavailable")]
  StorageUnavailable,
}

impl ApiError {
  pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
    Self::Validation {
      field,
      message: message.into(),
    }
  }

  /// Message suitable for showing to a user.
  pub fn user_message(&self) -> String {
    match self {
      Self::Network(_) | Self::Timeout => {
        "Unable to reach the store right now. Please try again.".to_string()
      }
      Self::Storage(_) | Self::StorageUnavailable | Self::InvalidRule { .. } => {
        "Something went wrong.".to_string()
      }
      other => other.to_string(),
    }
  }

  /// HTTP status for server-side rejections.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Business { status, .. } => Some(*status),
      Self::Unauthorized => Some(401),
      _ => None,
    }
  }

  /// Whether the server rejected a create because the thing already exists.
  pub fn is_already_exists(&self) -> bool {
    match self {
      Self::Business { status, message } => {
        *status == 409 || message.to_lowercase().contains("already")
      }
      _ => false,
    }
  }
}
