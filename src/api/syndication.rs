//! Unauthenticated syndication metadata strategy.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::client::{preview, XClient};
use crate::api::fetcher::MetadataSource;
use crate::api::types::{DocumentSource, PostRef, RawDocument};
use crate::error::{Error, Result};

/// Public embed endpoints, tried in order until one returns a JSON object.
pub struct SyndicationSource {
    client: Arc<XClient>,
}

impl SyndicationSource {
    pub fn new(client: Arc<XClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetadataSource for SyndicationSource {
    fn name(&self) -> &'static str {
        "syndication"
    }

    async fn fetch(&self, post: &PostRef) -> Result<RawDocument> {
        let mut last_url = None;
        let mut last_status = None;
        let mut last_reason = "no syndication endpoints configured".to_string();

        for url in self.client.endpoints().syndication_urls(post) {
            let response = match self
                .client
                .http()
                .get(&url)
                .headers(self.client.browser_headers())
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!("Syndication request to {} failed: {}", url, e);
                    last_reason = e.to_string();
                    last_status = None;
                    last_url = Some(url);
                    continue;
                }
            };

            let status = response.status().as_u16();
            tracing::debug!("Syndication {} -> HTTP {}", url, status);

            match accept_body(status, response.text().await) {
                Ok(text) => {
                    return RawDocument::parse(DocumentSource::Syndication, post, &url, text);
                }
                Err(reason) => last_reason = reason,
            }

            last_status = Some(status);
            last_url = Some(url);
        }

        Err(Error::Metadata {
            post_url: post.url.clone(),
            url: last_url,
            status: last_status,
            message: format!("syndication unavailable: {}", last_reason),
        })
    }
}

/// Keep a body only when it is a 200 response holding a non-empty JSON object.
///
/// The error is the reason reported if every variant fails.
fn accept_body(status: u16, body: reqwest::Result<String>) -> std::result::Result<String, String> {
    if status != 200 {
        return Err("unexpected HTTP status".to_string());
    }

    let text = body.map_err(|e| format!("failed to read response body: {}", e))?;
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) if value.as_object().is_some_and(|o| !o.is_empty()) => Ok(text),
        _ => {
            tracing::debug!("Syndication body is not a JSON object: {}", preview(&text, 200));
            Err("response is not a non-empty JSON object".to_string())
        }
    }
}
