//! API value types and upstream response shapes.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::config::parse_post_url;
use crate::error::{Error, Result};

/// A validated reference to a single post.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostRef {
    /// Numeric post id (digits only).
    pub id: String,
    /// Account handle from the URL path.
    pub handle: String,
    /// Canonical `https://x.com/<handle>/status/<id>` URL.
    pub url: String,
}

impl PostRef {
    pub(crate) fn new(handle: &str, id: &str) -> Self {
        Self {
            id: id.to_string(),
            handle: handle.to_string(),
            url: format!("https://x.com/{}/status/{}", handle, id),
        }
    }
}

impl FromStr for PostRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_post_url(s)
    }
}

impl fmt::Display for PostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Anonymous credentials for the authenticated metadata endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub bearer_token: String,
    pub guest_token: String,
    pub query_id: String,
}

/// Which metadata strategy produced a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSource {
    Syndication,
    GraphQl,
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Syndication => write!(f, "syndication"),
            DocumentSource::GraphQl => write!(f, "graphql"),
        }
    }
}

/// Raw post-detail document, normalized across metadata strategies.
///
/// Keeps both the response text (scanned by the repost resolver and the URL
/// scan parser) and its parsed JSON (walked by the structured parsers).
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub source: DocumentSource,
    pub post: PostRef,
    /// URL the document was fetched from.
    pub url: String,
    pub text: String,
    pub json: Value,
}

impl RawDocument {
    /// Parse a response body into a document.
    pub fn parse(source: DocumentSource, post: &PostRef, url: &str, text: String) -> Result<Self> {
        let json: Value = serde_json::from_str(&text).map_err(|e| Error::ProtocolShape {
            post_url: post.url.clone(),
            url: Some(url.to_string()),
            message: format!("response is not JSON: {}", e),
        })?;

        Ok(Self {
            source,
            post: post.clone(),
            url: url.to_string(),
            text,
            json,
        })
    }

    /// Build a document directly from text, used where the body is already trusted.
    pub fn from_text(source: DocumentSource, post: &PostRef, text: &str) -> Result<Self> {
        Self::parse(source, post, &post.url, text.to_string())
    }
}

/// Guest activation response.
#[derive(Debug, Deserialize)]
pub struct GuestActivation {
    #[serde(default)]
    pub guest_token: String,
}

/// GraphQL error body returned with HTTP 400.
#[derive(Debug, Deserialize)]
pub struct GraphQlErrorBody {
    pub errors: Vec<GraphQlError>,
}

/// A single GraphQL error entry.
#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: String,
}

/// A media entity as it appears in entities, extended entities, syndication
/// `mediaDetails` and card `media_entities`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaEntity {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub media_url_https: Option<String>,
    pub video_info: Option<VideoInfo>,
}

/// Video renditions of a media entity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub variants: Vec<VariantInfo>,
}

/// One encoded rendition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariantInfo {
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub url: String,
    pub bitrate: Option<u64>,
}

/// Syndication photo entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyndicationPhoto {
    pub url: Option<String>,
}

/// Card `binding_values` entry of the GraphQL shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BindingValue {
    #[serde(default)]
    pub key: String,
    pub value: Option<BindingValueContent>,
}

/// Binding value payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BindingValueContent {
    pub string_value: Option<String>,
}

/// Decoded `unified_card` blob.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnifiedCard {
    #[serde(default)]
    pub media_entities: serde_json::Map<String, Value>,
}
