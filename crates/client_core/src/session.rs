//! Gate in front of the dispatcher.
//!
//! This is not an access-control boundary. It only decides which identity a
//! form session is opened with; real credential checks belong to whatever
//! [`CredentialVerifier`] the host application plugs in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GUEST_DISPLAY_NAME: &str = "Guest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub display_name: String,
    pub is_guest: bool,
}

impl SessionIdentity {
    pub fn guest() -> Self {
        Self {
            display_name: GUEST_DISPLAY_NAME.to_string(),
            is_guest: true,
        }
    }

    pub fn user(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            is_guest: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("username and password are required")]
    MissingCredentials,
    #[error("invalid credentials; try again or continue as guest")]
    InvalidCredentials,
    #[error("credential backend unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> Result<SessionIdentity, LoginError>;
}

/// Used when the host wires no verifier; only the guest path is open.
pub struct NoCredentialBackend;

#[async_trait]
impl CredentialVerifier for NoCredentialBackend {
    async fn verify(&self, _username: &str, _password: &str) -> Result<SessionIdentity, LoginError> {
        Err(LoginError::Unavailable(
            "no credential verifier configured".to_string(),
        ))
    }
}

pub struct SessionGate<V: CredentialVerifier> {
    verifier: V,
}

impl<V: CredentialVerifier> SessionGate<V> {
    pub fn new(verifier: V) -> Self {
        Self { verifier }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<SessionIdentity, LoginError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(LoginError::MissingCredentials);
        }
        let identity = self.verifier.verify(username, password).await?;
        tracing::info!(user = %identity.display_name, "session opened");
        Ok(identity)
    }

    pub fn continue_as_guest(&self) -> SessionIdentity {
        tracing::info!("session opened as guest");
        SessionIdentity::guest()
    }
}
