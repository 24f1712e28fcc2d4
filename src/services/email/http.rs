use anyhow::Context;
use async_trait::async_trait;

use super::{EmailProvider, OutgoingEmail};

pub struct HttpEmailProvider {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpEmailProvider {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            api_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailProvider for HttpEmailProvider {
    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        let url = format!("{}/emails", self.api_url.trim_end_matches('/'));

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await
            .context("failed to call email API")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "(no body)".to_string());
            anyhow::bail!("email API error ({}): {}", status, body);
        }

        tracing::debug!(to = ?email.to, subject = %email.subject, "email accepted");
        Ok(())
    }
}
