use serde::de::DeserializeOwned;

use super::{MlsError, MlsResource, MlsTransport, RetryPolicy};
use crate::config::AppConfig;
use crate::services::odata::{ODataPage, ODataQuery};

#[derive(Debug, Clone, Default)]
pub struct MlsTokens {
    pub property: String,
    pub media: String,
    pub property_sold: String,
}

impl MlsTokens {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            property: config.mls_property_token.clone(),
            media: config.mls_media_token.clone(),
            property_sold: config.mls_sold_token.clone(),
        }
    }

    fn for_resource(&self, resource: MlsResource) -> &str {
        match resource {
            MlsResource::Property => &self.property,
            MlsResource::Media => &self.media,
            MlsResource::PropertySold => &self.property_sold,
        }
    }
}

pub struct MlsClient {
    transport: Box<dyn MlsTransport>,
    base_url: String,
    tokens: MlsTokens,
    retry: RetryPolicy,
}

impl MlsClient {
    pub fn new(
        transport: Box<dyn MlsTransport>,
        base_url: impl Into<String>,
        tokens: MlsTokens,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            tokens,
            retry,
        }
    }

    pub fn resource_url(&self, resource: MlsResource) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), resource.path())
    }

    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        resource: MlsResource,
        query: &ODataQuery,
    ) -> Result<ODataPage<T>, MlsError> {
        let url = query.url(&self.resource_url(resource));
        self.fetch_url(resource, &url).await
    }

    /// Runs `query` and follows `@odata.nextLink` until the feed runs out or
    /// `max_pages` pages have been read.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        resource: MlsResource,
        query: &ODataQuery,
        max_pages: usize,
    ) -> Result<Vec<T>, MlsError> {
        let mut page: ODataPage<T> = self.fetch_page(resource, query).await?;
        let mut items = std::mem::take(&mut page.value);
        let mut pages = 1;

        while let Some(next) = page.next_link.take() {
            if pages >= max_pages {
                tracing::warn!(
                    resource = resource.as_str(),
                    pages,
                    items = items.len(),
                    "page limit reached with more results pending"
                );
                break;
            }
            let url = self.next_url(resource, &next)?;
            page = self.fetch_url(resource, &url).await?;
            items.append(&mut page.value);
            pages += 1;
        }

        Ok(items)
    }

    // Next links are usually absolute but may be relative to the resource.
    fn next_url(&self, resource: MlsResource, link: &str) -> Result<String, MlsError> {
        if link.starts_with("http://") || link.starts_with("https://") {
            return Ok(link.to_string());
        }
        url::Url::parse(&self.resource_url(resource))
            .and_then(|base| base.join(link))
            .map(String::from)
            .map_err(|e| MlsError::Request(format!("bad next link {link:?}: {e}")))
    }

    async fn fetch_url<T: DeserializeOwned>(
        &self,
        resource: MlsResource,
        url: &str,
    ) -> Result<ODataPage<T>, MlsError> {
        let token = self.tokens.for_resource(resource);
        if token.trim().is_empty() {
            return Err(MlsError::MissingToken(resource.as_str()));
        }

        tracing::debug!(resource = resource.as_str(), url = %url, "MLS request");

        let value = self
            .retry
            .run(resource.as_str(), || self.transport.get_json(url, token))
            .await?;

        serde_json::from_value(value).map_err(|e| MlsError::Decode(e.to_string()))
    }
}
