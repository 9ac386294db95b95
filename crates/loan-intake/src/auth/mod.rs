//! Single-administrator gate for the dashboard and export.

pub mod session;

use serde::Deserialize;

use crate::config::AdminConfig;

pub use session::{FlashLevel, FlashMessage, SessionId, SessionSigner, SessionState, SessionStore};

/// The one identity allowed to view submitted applications.
#[derive(Clone)]
pub struct AdminCredentials {
    username: String,
    password: String,
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(config.username.clone(), config.password.clone())
    }

    /// Exact string comparison of both fields.
    pub fn verify(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if username == self.username && password == self.password {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Posted login form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
}

/// A gated page was requested without an authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("login required")]
pub struct AuthRequired;
