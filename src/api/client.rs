//! HTTP client with browser-like headers and the upstream endpoint table.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{header, redirect, Client, Response};

use crate::api::types::PostRef;
use crate::config::Config;
use crate::error::{Error, Result};

/// Upstream endpoints. Overridable so tests can point at a local server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Base of public post pages (`<base>/<handle>/status/<id>`).
    pub page_base: String,
    /// Migration handshake form target.
    pub migrate: String,
    /// Guest token activation endpoint.
    pub guest_activate: String,
    /// GraphQL base (`<base>/<query_id>/<operation>`).
    pub graphql_base: String,
    /// Syndication endpoint variants, tried in order. `{id}` is replaced by the post id.
    pub syndication: Vec<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            page_base: "https://x.com".to_string(),
            migrate: "https://x.com/x/migrate".to_string(),
            guest_activate: "https://api.x.com/1.1/guest/activate.json".to_string(),
            graphql_base: "https://x.com/i/api/graphql".to_string(),
            syndication: vec![
                "https://cdn.syndication.twimg.com/tweet-result?id={id}&lang=en&token=0".to_string(),
                "https://cdn.syndication.twimg.com/tweet-result?id={id}".to_string(),
                "https://syndication.twitter.com/srv/timeline-profile/screen-name/x?tweet_id={id}"
                    .to_string(),
            ],
        }
    }
}

impl Endpoints {
    /// All endpoints rooted at one base URL, used against mock servers.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            page_base: base.to_string(),
            migrate: format!("{}/x/migrate", base),
            guest_activate: format!("{}/1.1/guest/activate.json", base),
            graphql_base: format!("{}/i/api/graphql", base),
            syndication: vec![
                format!("{}/tweet-result?id={{id}}&lang=en&token=0", base),
                format!("{}/tweet-result?id={{id}}", base),
            ],
        }
    }

    /// Public page URL of a post.
    pub fn post_page(&self, post: &PostRef) -> String {
        format!("{}/{}/status/{}", self.page_base, post.handle, post.id)
    }

    /// Syndication URLs for a post, in fallback order.
    pub fn syndication_urls(&self, post: &PostRef) -> Vec<String> {
        self.syndication
            .iter()
            .map(|template| template.replace("{id}", &post.id))
            .collect()
    }
}

/// Cookie-sharing client pair used for one credential bootstrap.
pub struct Session {
    /// Follows redirects.
    pub follow: Client,
    /// Returns 3xx responses as-is.
    pub no_follow: Client,
}

/// HTTP client shared by every pipeline stage.
pub struct XClient {
    client: Client,
    user_agent: String,
    timeout: Duration,
    endpoints: Endpoints,
}

impl XClient {
    /// Create a new client.
    pub fn new(user_agent: String, timeout: Duration, endpoints: Endpoints) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_agent,
            timeout,
            endpoints,
        })
    }

    /// Create a client against the production endpoints.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.network.user_agent.clone(),
            config.request_timeout(),
            Endpoints::default(),
        )
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Headers a desktop browser sends for a plain navigation.
    pub fn browser_headers(&self) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("*/*"));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US, en, *;q=0.5"),
        );
        if let Ok(ua) = header::HeaderValue::from_str(&self.user_agent) {
            headers.insert(header::USER_AGENT, ua);
        }
        headers
    }

    /// Build a fresh cookie-carrying session for a bootstrap.
    pub fn session(&self) -> Result<Session> {
        let jar = Arc::new(Jar::default());

        let build = |policy: redirect::Policy| {
            Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .cookie_provider(Arc::clone(&jar))
                .redirect(policy)
                .build()
                .map_err(|e| Error::Config(format!("Failed to create HTTP session: {}", e)))
        };

        Ok(Session {
            follow: build(redirect::Policy::default())?,
            no_follow: build(redirect::Policy::none())?,
        })
    }

    /// GET a URL with browser headers, requiring a success status.
    pub async fn download_file(&self, post_url: &str, url: &str) -> Result<Response> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .headers(self.browser_headers())
            .send()
            .await
            .map_err(|e| Error::network(post_url, url, e))?;

        let status = response.status();
        tracing::debug!("Response status: {}", status);

        if !status.is_success() {
            return Err(Error::status(post_url, url, status.as_u16()));
        }

        Ok(response)
    }

    /// Fetch a URL as text.
    pub async fn fetch_text(&self, post_url: &str, url: &str) -> Result<String> {
        let response = self.download_file(post_url, url).await?;
        response
            .text()
            .await
            .map_err(|e| Error::network(post_url, url, e))
    }

    /// Fetch a URL as bytes.
    pub async fn fetch_bytes(&self, post_url: &str, url: &str) -> Result<Vec<u8>> {
        let response = self.download_file(post_url, url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::network(post_url, url, e))?;
        Ok(bytes.to_vec())
    }
}

/// First `max` characters of a body, for debug logs.
pub(crate) fn preview(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base: &str) -> XClient {
        XClient::new(
            "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/120.0".to_string(),
            Duration::from_secs(5),
            Endpoints::with_base(base),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_urls() {
        let endpoints = Endpoints::default();
        let post = PostRef::new("someone", "42");
        assert_eq!(endpoints.post_page(&post), "https://x.com/someone/status/42");

        let urls = endpoints.syndication_urls(&post);
        assert_eq!(urls.len(), 3);
        assert_eq!(
            urls[0],
            "https://cdn.syndication.twimg.com/tweet-result?id=42&lang=en&token=0"
        );
        assert!(urls[2].ends_with("tweet_id=42"));
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("héllo", 2), "hé");
        assert_eq!(preview("hi", 10), "hi");
    }

    #[tokio::test]
    async fn test_download_file_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header_exists("accept-language"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let url = format!("{}/page", server.uri());
        let body = client.fetch_text("https://x.com/a/status/1", &url).await.unwrap();
        assert_eq!(body, "ok");

        // Compare the raw value; list-valued headers are split by matchers.
        let requests = server.received_requests().await.unwrap();
        let language = requests[0].headers.get("accept-language").unwrap();
        assert_eq!(language.to_str().unwrap(), "en-US, en, *;q=0.5");
    }

    #[tokio::test]
    async fn test_download_file_non_success_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let url = format!("{}/missing", server.uri());
        let err = client
            .fetch_bytes("https://x.com/a/status/1", &url)
            .await
            .unwrap_err();

        match err {
            Error::Transport {
                post_url, status, ..
            } => {
                assert_eq!(post_url, "https://x.com/a/status/1");
                assert_eq!(status, Some(404));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
