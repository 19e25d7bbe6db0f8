use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::debug;

use crate::{engine::RequestEnvelope, error::CallError};

#[async_trait]
pub trait DispatchTransport: Send + Sync {
    /// Performs exactly one call for `envelope`. Implementations must not retry.
    async fn post_json(&self, envelope: &RequestEnvelope) -> Result<Value, CallError>;
}

pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DispatchTransport for HttpTransport {
    async fn post_json(&self, envelope: &RequestEnvelope) -> Result<Value, CallError> {
        debug!(mode = %envelope.mode, target = %envelope.target, "posting request");
        let response = self
            .http
            .post(envelope.target.clone())
            .header(header::ACCEPT, "application/json")
            .json(&envelope.body)
            .send()
            .await?
            .error_for_status()?;

        let raw = response.bytes().await?;
        serde_json::from_slice::<Value>(&raw).map_err(|err| CallError::Decode(err.to_string()))
    }
}
