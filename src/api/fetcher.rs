//! Ordered metadata strategies.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::api::auth::CredentialCache;
use crate::api::client::XClient;
use crate::api::graphql::{GraphQlSource, TemplateCache};
use crate::api::syndication::SyndicationSource;
use crate::api::types::{PostRef, RawDocument};
use crate::error::{Error, Result};

/// One way of turning a post reference into a raw document.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self, post: &PostRef) -> Result<RawDocument>;
}

/// Why a single strategy failed.
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub source: &'static str,
    pub reason: String,
    pub url: Option<String>,
    pub status: Option<u16>,
}

impl StrategyFailure {
    fn new(source: &'static str, err: &Error) -> Self {
        Self {
            source,
            reason: err.to_string(),
            url: err.resource_url().map(str::to_string),
            status: err.http_status(),
        }
    }
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.reason)
    }
}

/// Tries each strategy in order and returns the first document obtained.
pub struct MetadataFetcher {
    sources: Vec<Arc<dyn MetadataSource>>,
}

impl MetadataFetcher {
    pub fn new(sources: Vec<Arc<dyn MetadataSource>>) -> Self {
        Self { sources }
    }

    /// Syndication first, then GraphQL.
    pub fn standard(
        client: Arc<XClient>,
        credentials: Arc<CredentialCache>,
        templates: Arc<TemplateCache>,
        fallback_query_id: String,
    ) -> Self {
        let syndication = SyndicationSource::new(Arc::clone(&client));
        let graphql = GraphQlSource::new(client, credentials, templates, fallback_query_id);
        Self::new(vec![
            Arc::new(syndication) as Arc<dyn MetadataSource>,
            Arc::new(graphql),
        ])
    }

    /// Fetch the raw document for a post.
    ///
    /// A credential or shape error from the last strategy is returned as-is;
    /// any other exhaustion is reported as a metadata error naming every
    /// failed strategy.
    pub async fn fetch(&self, post: &PostRef) -> Result<RawDocument> {
        let mut failures = Vec::new();
        let mut last_error = None;

        for source in &self.sources {
            tracing::debug!("Fetching {} via {}", post.id, source.name());

            match source.fetch(post).await {
                Ok(document) => {
                    tracing::info!("Fetched metadata for {} via {}", post.id, source.name());
                    return Ok(document);
                }
                Err(e) => {
                    let failure = StrategyFailure::new(source.name(), &e);
                    tracing::warn!("Metadata strategy failed, {}", failure);
                    failures.push(failure);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e @ (Error::Credential { .. } | Error::ProtocolShape { .. })) => Err(e),
            _ => {
                let last = failures.last();
                Err(Error::Metadata {
                    post_url: post.url.clone(),
                    url: last.and_then(|f| f.url.clone()),
                    status: last.and_then(|f| f.status),
                    message: if failures.is_empty() {
                        "no metadata strategies configured".to_string()
                    } else {
                        failures
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join("; ")
                    },
                })
            }
        }
    }
}
