use std::time::Duration;

use async_trait::async_trait;

use super::{MlsError, MlsTransport};

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

fn classify(e: reqwest::Error) -> MlsError {
    if e.is_decode() {
        MlsError::Decode(e.to_string())
    } else if e.is_connect() || e.is_timeout() || e.is_request() || e.is_body() {
        MlsError::Network(e.to_string())
    } else {
        MlsError::Request(e.to_string())
    }
}

#[async_trait]
impl MlsTransport for HttpTransport {
    async fn get_json(&self, url: &str, bearer: &str) -> Result<serde_json::Value, MlsError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(bearer)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MlsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json().await.map_err(classify)
    }
}
