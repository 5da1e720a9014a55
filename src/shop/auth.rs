//! Sign in and sign out.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{decode, unwrap_field};
use crate::error::{ApiError, Result};
use crate::events::AUTH_LOGOUT;
use crate::http::ApiClient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  #[serde(alias = "_id")]
  pub id: String,
  pub name: String,
  pub email: String,
  #[serde(default)]
  pub is_admin: bool,
}

#[derive(Clone)]
pub struct Auth {
  client: ApiClient,
}

impl Auth {
  pub fn new(client: ApiClient) -> Self {
    Self { client }
  }

  /// Exchange credentials for a token and remember it.
  ///
  /// Admins also get their profile stored as the admin session.
  pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
      return Err(ApiError::validation("email", "Please enter a valid email"));
    }
    if password.is_empty() {
      return Err(ApiError::validation("password", "Please enter your password"));
    }

    let body = self
      .client
      .post(
        "/auth/login",
        json!({ "email": email, "password": password }),
      )
      .await?;

    let token = body
      .get("token")
      .and_then(Value::as_str)
      .filter(|t| !t.is_empty())
      .ok_or_else(|| ApiError::Malformed("login response without token".to_string()))?;
    let profile: UserProfile = decode(unwrap_field(&body, "user"), "user")?;

    let session = self.client.session();
    session.set_token(token)?;
    if profile.is_admin {
      let stored = serde_json::to_value(&profile)
        .map_err(|e| ApiError::Malformed(format!("user: {}", e)))?;
      session.set_admin_session(&stored)?;
    }

    tracing::info!(user_id = %profile.id, admin = profile.is_admin, "signed in");
    Ok(profile)
  }

  /// Forget the session locally and drop anything cached for this user.
  pub fn logout(&self) -> Result<()> {
    self.client.session().clear()?;
    self.client.cache().clear();
    self
      .client
      .events()
      .emit(AUTH_LOGOUT, &json!({ "reason": "user" }));
    tracing::info!("signed out");
    Ok(())
  }

  pub fn is_signed_in(&self) -> bool {
    self.client.session().token().is_some()
  }

  /// Stored admin profile, if the signed-in user is an admin.
  pub fn admin(&self) -> Option<UserProfile> {
    self
      .client
      .session()
      .admin_session()
      .and_then(|v| serde_json::from_value(v).ok())
      .filter(|p: &UserProfile| p.is_admin)
  }

  pub fn is_admin(&self) -> bool {
    self.admin().is_some()
  }
}
