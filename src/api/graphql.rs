//! Authenticated GraphQL metadata strategy.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::api::auth::{CredentialCache, OPERATION_NAME};
use crate::api::client::{preview, XClient};
use crate::api::fetcher::MetadataSource;
use crate::api::types::{Credentials, DocumentSource, GraphQlErrorBody, PostRef, RawDocument};
use crate::error::{Error, Result};

/// Maximum requests per lookup, the first one included.
pub const MAX_ATTEMPTS: usize = 10;

static NEEDED_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Variable '([^']+)'").expect("variable pattern"));

static NEEDED_FEATURES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"The following features cannot be null: ([^"]+)"#).expect("features pattern")
});

/// The `{features, variables}` request body template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTemplate {
    #[serde(default)]
    pub features: Map<String, Value>,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

impl Default for RequestTemplate {
    fn default() -> Self {
        let variables = [
            ("with_rux_injections", false),
            ("includePromotedContent", true),
            ("withCommunity", true),
            ("withQuickPromoteEligibilityTweetFields", true),
            ("withBirdwatchNotes", true),
            ("withDownvotePerspective", false),
            ("withReactionsMetadata", false),
            ("withReactionsPerspective", false),
            ("withVoice", true),
            ("withV2Timeline", true),
        ];

        let features = [
            ("blue_business_profile_image_shape_enabled", true),
            ("responsive_web_graphql_exclude_directive_enabled", true),
            ("verified_phone_label_enabled", false),
            ("responsive_web_graphql_timeline_navigation_enabled", true),
            ("responsive_web_graphql_skip_user_profile_image_extensions_enabled", false),
            ("tweetypie_unmention_optimization_enabled", true),
            ("vibe_api_enabled", true),
            ("responsive_web_edit_tweet_api_enabled", true),
            ("graphql_is_translatable_rweb_tweet_is_translatable_enabled", true),
            ("view_counts_everywhere_api_enabled", true),
            ("longform_notetweets_consumption_enabled", true),
            ("tweet_awards_web_tipping_enabled", false),
            ("freedom_of_speech_not_reach_fetch_enabled", false),
            ("standardized_nudges_misinfo", true),
            ("tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled", false),
            ("interactive_text_enabled", true),
            ("responsive_web_text_conversations_enabled", false),
            ("longform_notetweets_richtext_consumption_enabled", false),
            ("responsive_web_enhance_cards_enabled", false),
        ];

        Self {
            features: features
                .into_iter()
                .map(|(k, v)| (k.to_string(), Value::Bool(v)))
                .collect(),
            variables: variables
                .into_iter()
                .map(|(k, v)| (k.to_string(), Value::Bool(v)))
                .collect(),
        }
    }
}

impl RequestTemplate {
    /// Variables for one post, leaving the template untouched.
    pub fn variables_for(&self, post_id: &str) -> Map<String, Value> {
        let mut variables = self.variables.clone();
        variables.insert("tweetId".to_string(), Value::String(post_id.to_string()));
        variables
    }

    /// Set every variable and feature named by the error messages to `true`.
    ///
    /// Returns how many names were set.
    pub fn apply_errors(&mut self, body: &GraphQlErrorBody) -> usize {
        let mut applied = 0;

        for error in &body.errors {
            for captures in NEEDED_VARIABLE.captures_iter(&error.message) {
                self.variables
                    .insert(captures[1].to_string(), Value::Bool(true));
                applied += 1;
            }

            for captures in NEEDED_FEATURES.captures_iter(&error.message) {
                for feature in captures[1].split(',') {
                    let feature = feature.trim();
                    if !feature.is_empty() {
                        self.features.insert(feature.to_string(), Value::Bool(true));
                        applied += 1;
                    }
                }
            }
        }

        applied
    }
}

/// Request template store: read at the start of a lookup, written after a successful self-heal.
#[derive(Debug)]
pub struct TemplateCache {
    path: Option<PathBuf>,
    current: RwLock<RequestTemplate>,
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl TemplateCache {
    /// A cache that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: RwLock::new(RequestTemplate::default()),
        }
    }

    /// A cache persisted at `path`, seeded from it when the file exists.
    pub fn load(path: &Path) -> Result<Self> {
        let template = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            RequestTemplate::default()
        };

        Ok(Self {
            path: Some(path.to_path_buf()),
            current: RwLock::new(template),
        })
    }

    pub async fn snapshot(&self) -> RequestTemplate {
        self.current.read().await.clone()
    }

    /// Replace the template and persist it when backed by a file.
    pub async fn store(&self, template: &RequestTemplate) -> Result<()> {
        *self.current.write().await = template.clone();

        if let Some(path) = &self.path {
            let content = serde_json::to_string_pretty(template)?;
            tokio::fs::write(path, content).await?;
            tracing::debug!("Saved request template to {}", path.display());
        }

        Ok(())
    }
}

/// GraphQL `TweetResultByRestId` strategy.
pub struct GraphQlSource {
    client: Arc<XClient>,
    credentials: Arc<CredentialCache>,
    templates: Arc<TemplateCache>,
    fallback_query_id: String,
}

impl GraphQlSource {
    pub fn new(
        client: Arc<XClient>,
        credentials: Arc<CredentialCache>,
        templates: Arc<TemplateCache>,
        fallback_query_id: String,
    ) -> Self {
        Self {
            client,
            credentials,
            templates,
            fallback_query_id,
        }
    }

    /// Fetch the post with the given credentials, healing the template on HTTP 400.
    pub async fn fetch_with(&self, post: &PostRef, credentials: &Credentials) -> Result<RawDocument> {
        let endpoint = format!(
            "{}/{}/{}",
            self.client.endpoints().graphql_base,
            credentials.query_id,
            OPERATION_NAME
        );

        let mut template = self.templates.snapshot().await;
        let mut healed = false;
        let mut last_url = endpoint.clone();

        for attempt in 1..=MAX_ATTEMPTS {
            let variables = serde_json::to_string(&template.variables_for(&post.id))?;
            let features = serde_json::to_string(&template.features)?;

            let response = self
                .client
                .http()
                .get(&endpoint)
                .query(&[("variables", variables), ("features", features)])
                .headers(self.client.browser_headers())
                .header(header::AUTHORIZATION, format!("Bearer {}", credentials.bearer_token))
                .header("x-guest-token", &credentials.guest_token)
                .header(header::CONTENT_TYPE, "application/json")
                .send()
                .await
                .map_err(|e| Error::network(&post.url, &endpoint, e))?;

            let status = response.status().as_u16();
            last_url = response.url().to_string();
            let text = response
                .text()
                .await
                .map_err(|e| Error::network(&post.url, &last_url, e))?;

            tracing::debug!("GraphQL attempt {}: HTTP {}", attempt, status);
            tracing::debug!("GraphQL body: {}", preview(&text, 1000));

            match status {
                200 => {
                    if healed {
                        if let Err(e) = self.templates.store(&template).await {
                            tracing::warn!("Failed to persist request template: {}", e);
                        }
                    }
                    return RawDocument::parse(DocumentSource::GraphQl, post, &last_url, text);
                }
                400 => {
                    let body: GraphQlErrorBody =
                        serde_json::from_str(&text).map_err(|e| Error::ProtocolShape {
                            post_url: post.url.clone(),
                            url: Some(last_url.clone()),
                            message: format!("HTTP 400 without a GraphQL error list: {}", e),
                        })?;

                    let applied = template.apply_errors(&body);
                    tracing::debug!("Self-heal set {} variable(s)/feature(s) to true", applied);
                    healed = true;
                }
                401 | 403 => {
                    self.credentials.invalidate().await;
                    return Err(Error::Metadata {
                        post_url: post.url.clone(),
                        url: Some(last_url),
                        status: Some(status),
                        message: "credentials rejected".to_string(),
                    });
                }
                _ => {
                    return Err(Error::Metadata {
                        post_url: post.url.clone(),
                        url: Some(last_url),
                        status: Some(status),
                        message: "unexpected HTTP status".to_string(),
                    });
                }
            }
        }

        Err(Error::Metadata {
            post_url: post.url.clone(),
            url: Some(last_url),
            status: Some(400),
            message: format!("request still rejected after {} attempts", MAX_ATTEMPTS),
        })
    }
}

#[async_trait]
impl MetadataSource for GraphQlSource {
    fn name(&self) -> &'static str {
        "graphql"
    }

    async fn fetch(&self, post: &PostRef) -> Result<RawDocument> {
        let credentials = self
            .credentials
            .acquire(&self.client, post, &self.fallback_query_id)
            .await?;
        self.fetch_with(post, &credentials).await
    }
}
