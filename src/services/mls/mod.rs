pub mod client;
pub mod http;
pub mod retry;

use async_trait::async_trait;

pub use client::{MlsClient, MlsTokens};
pub use http::HttpTransport;
pub use retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MlsResource {
    Property,
    Media,
    PropertySold,
}

impl MlsResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MlsResource::Property => "Property",
            MlsResource::Media => "Media",
            MlsResource::PropertySold => "PropertySold",
        }
    }

    pub fn path(&self) -> String {
        format!("/odata/{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MlsError {
    #[error("network error: {0}")]
    Network(String),

    #[error("MLS API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode MLS response: {0}")]
    Decode(String),

    #[error("invalid MLS request: {0}")]
    Request(String),

    #[error("no API token configured for {0}")]
    MissingToken(&'static str),
}

impl MlsError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MlsError::Network(_))
    }
}

#[async_trait]
pub trait MlsTransport: Send + Sync {
    async fn get_json(&self, url: &str, bearer: &str) -> Result<serde_json::Value, MlsError>;
}
