//! Anonymous credential bootstrap.
//!
//! Acquiring credentials mimics an unauthenticated browser:
//! 1. Fetch the post page with browser headers.
//! 2. Follow a meta-refresh or `location.replace` redirect if the page has one.
//! 3. Run the migrate handshake when a `tok` parameter or hidden `data` field exists.
//! 4. Locate and fetch the versioned client bundle (`main.<hash>.js`).
//! 5. Pull the bearer token and the `TweetResultByRestId` query id from the bundle.
//! 6. Take the guest token from the page's `gt` cookie assignment, or activate one.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::{header, Response};
use tokio::sync::RwLock;

use crate::api::client::{preview, XClient};
use crate::api::types::{Credentials, GuestActivation, PostRef};
use crate::error::{BootstrapStep, Error, Result};

/// GraphQL operation resolving a post by id.
pub const OPERATION_NAME: &str = "TweetResultByRestId";

static META_REFRESH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)content="0;\s*url\s*=\s*(https?://[^"]+)""#).expect("meta refresh pattern")
});

static JS_REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"window\.location\.replace\("([^"]+)"\)"#).expect("js redirect pattern")
});

static TOK_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"tok=([^&"]+)"#).expect("tok pattern"));

static DATA_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input type="hidden" name="data" value="([^"]+)""#).expect("data field pattern")
});

static BUNDLE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s"'<>]+/responsive-web/client-web(?:-legacy)?/main\.[^.\s"'<>]+\.js"#)
        .expect("bundle pattern")
});

static BEARER_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"AAAAAAAAA[^"]+"#).expect("bearer pattern"));

static BEARER_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Bearer\s+([^\s"]+)"#).expect("bearer literal pattern"));

static QUERY_ID_BEFORE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"queryId:"([^"]+)",operationName:"TweetResultByRestId""#)
        .expect("query id pattern")
});

static QUERY_ID_AFTER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"TweetResultByRestId.{0,200}?queryId:"([^"]+)""#).expect("query id pattern")
});

static GUEST_COOKIE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"document\.cookie\s*=\s*"gt=(\d+);"#).expect("guest cookie pattern")
});

/// Find a redirect target in a stub page. Meta refresh wins over script redirects.
pub fn find_redirect(page: &str) -> Option<String> {
    META_REFRESH
        .captures(page)
        .or_else(|| JS_REDIRECT.captures(page))
        .map(|c| c[1].replace("&amp;", "&"))
}

/// The `tok` query parameter of a redirect URL.
pub fn find_tok(url: &str) -> Option<String> {
    TOK_PARAM.captures(url).map(|c| c[1].to_string())
}

/// The hidden `data` form field of a migrate page.
pub fn find_migrate_data(page: &str) -> Option<String> {
    DATA_FIELD.captures(page).map(|c| c[1].to_string())
}

/// URL of the versioned client bundle referenced by a page.
pub fn find_bundle_url(page: &str) -> Option<String> {
    BUNDLE_URL.find(page).map(|m| m.as_str().to_string())
}

/// Bearer token embedded in the client bundle.
pub fn find_bearer_token(bundle: &str) -> Option<String> {
    let token = BEARER_RUN
        .find(bundle)
        .map(|m| m.as_str().to_string())
        .or_else(|| BEARER_LITERAL.captures(bundle).map(|c| c[1].to_string()))?;

    let token = token.trim_start_matches("Bearer ").to_string();
    (!token.is_empty()).then_some(token)
}

/// Query id of the post-by-id operation, if the bundle exposes one.
pub fn find_query_id(bundle: &str) -> Option<String> {
    QUERY_ID_BEFORE_NAME
        .captures(bundle)
        .or_else(|| QUERY_ID_AFTER_NAME.captures(bundle))
        .map(|c| c[1].to_string())
}

/// Guest token set through `document.cookie` on the page.
pub fn find_guest_cookie(page: &str) -> Option<String> {
    GUEST_COOKIE.captures(page).map(|c| c[1].to_string())
}

fn step_error(
    step: BootstrapStep,
    post: &PostRef,
    url: Option<&str>,
    status: Option<u16>,
    message: impl Into<String>,
) -> Error {
    Error::Credential {
        step,
        post_url: post.url.clone(),
        url: url.map(str::to_string),
        status,
        message: message.into(),
    }
}

/// Read a response body, requiring HTTP 200.
async fn read_ok(step: BootstrapStep, post: &PostRef, url: &str, response: Response) -> Result<String> {
    let status = response.status();
    tracing::debug!("{}: {} -> {}", step, url, status);

    if status != reqwest::StatusCode::OK {
        return Err(step_error(
            step,
            post,
            Some(url),
            Some(status.as_u16()),
            "unexpected HTTP status",
        ));
    }

    let body = response
        .text()
        .await
        .map_err(|e| step_error(step, post, Some(url), None, e.to_string()))?;
    tracing::debug!("{} body: {}", step, preview(&body, 500));
    Ok(body)
}

/// Run the full bootstrap for one post.
pub async fn bootstrap(client: &XClient, post: &PostRef, fallback_query_id: &str) -> Result<Credentials> {
    let session = client.session()?;
    let headers = client.browser_headers();
    let page_url = client.endpoints().post_page(post);

    let send_err = |step: BootstrapStep, url: &str| {
        let url = url.to_string();
        move |e: reqwest::Error| step_error(step, post, Some(&url), None, e.to_string())
    };

    // Step 1: post page
    let response = session
        .follow
        .get(&page_url)
        .headers(headers.clone())
        .send()
        .await
        .map_err(send_err(BootstrapStep::FetchPage, &page_url))?;
    let page = read_ok(BootstrapStep::FetchPage, post, &page_url, response).await?;

    // Step 2: optional stub redirect
    let (redirect_url, mut working_page) = match find_redirect(&page) {
        Some(redirect_url) => {
            tracing::debug!("Following page redirect to {}", redirect_url);
            let response = session
                .no_follow
                .get(&redirect_url)
                .headers(headers.clone())
                .send()
                .await
                .map_err(send_err(BootstrapStep::FollowRedirect, &redirect_url))?;
            let body = read_ok(BootstrapStep::FollowRedirect, post, &redirect_url, response).await?;
            (redirect_url, body)
        }
        None => (page_url.clone(), page),
    };

    // Step 3: optional migrate handshake
    let mut form = Vec::new();
    if let Some(tok) = find_tok(&redirect_url) {
        form.push(("tok", tok));
    }
    if let Some(data) = find_migrate_data(&working_page) {
        form.push(("data", data));
    }

    if !form.is_empty() {
        let migrate_url = client.endpoints().migrate.clone();
        tracing::debug!("Running migrate handshake with {} field(s)", form.len());
        let response = session
            .follow
            .post(&migrate_url)
            .headers(headers.clone())
            .form(&form)
            .send()
            .await
            .map_err(send_err(BootstrapStep::Migrate, &migrate_url))?;
        working_page = read_ok(BootstrapStep::Migrate, post, &migrate_url, response).await?;
    }

    // Step 4: client bundle
    let bundle_url = find_bundle_url(&working_page).ok_or_else(|| {
        step_error(
            BootstrapStep::LocateBundle,
            post,
            None,
            None,
            "no client bundle reference in page",
        )
    })?;

    let response = session
        .follow
        .get(&bundle_url)
        .send()
        .await
        .map_err(send_err(BootstrapStep::FetchBundle, &bundle_url))?;
    let bundle = read_ok(BootstrapStep::FetchBundle, post, &bundle_url, response).await?;

    // Step 5: bearer token
    let bearer_token = find_bearer_token(&bundle).ok_or_else(|| {
        step_error(
            BootstrapStep::BearerToken,
            post,
            Some(&bundle_url),
            None,
            "no bearer token in client bundle",
        )
    })?;

    // Step 6: operation id, absence is expected
    let query_id = match find_query_id(&bundle) {
        Some(id) => {
            tracing::debug!("Found {} query id: {}", OPERATION_NAME, id);
            id
        }
        None => {
            tracing::debug!("Using fallback query id: {}", fallback_query_id);
            fallback_query_id.to_string()
        }
    };

    // Step 7: guest token
    let guest_token = match find_guest_cookie(&working_page) {
        Some(token) => {
            tracing::debug!("Found guest token in page cookie");
            token
        }
        None => activate_guest(client, &session.follow, post, &bearer_token).await?,
    };

    Ok(Credentials {
        bearer_token,
        guest_token,
        query_id,
    })
}

/// Activate a guest token with a bearer token.
async fn activate_guest(
    client: &XClient,
    http: &reqwest::Client,
    post: &PostRef,
    bearer_token: &str,
) -> Result<String> {
    let url = client.endpoints().guest_activate.clone();
    let step = BootstrapStep::GuestToken;

    let response = http
        .post(&url)
        .headers(client.browser_headers())
        .header(header::AUTHORIZATION, format!("Bearer {}", bearer_token))
        .send()
        .await
        .map_err(|e| step_error(step, post, Some(&url), None, e.to_string()))?;
    let body = read_ok(step, post, &url, response).await?;

    let activation: GuestActivation = serde_json::from_str(&body)
        .map_err(|e| step_error(step, post, Some(&url), Some(200), format!("invalid JSON: {}", e)))?;

    if activation.guest_token.is_empty() {
        return Err(step_error(step, post, Some(&url), Some(200), "empty guest token"));
    }

    Ok(activation.guest_token)
}

/// Stable half of the credentials, reusable across lookups.
#[derive(Debug, Clone)]
struct StableCredentials {
    bearer_token: String,
    query_id: String,
}

/// Process-lifetime cache of `{bearer_token, query_id}`.
///
/// Guest tokens are never cached: every acquisition gets a fresh one.
#[derive(Debug, Default)]
pub struct CredentialCache {
    stable: RwLock<Option<StableCredentials>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credentials for one lookup, reusing the cached bearer token and query id when present.
    pub async fn acquire(
        &self,
        client: &XClient,
        post: &PostRef,
        fallback_query_id: &str,
    ) -> Result<Credentials> {
        let cached = self.stable.read().await.clone();

        if let Some(stable) = cached {
            let session = client.session()?;
            match activate_guest(client, &session.follow, post, &stable.bearer_token).await {
                Ok(guest_token) => {
                    tracing::debug!("Reusing cached bearer token and query id");
                    return Ok(Credentials {
                        bearer_token: stable.bearer_token,
                        guest_token,
                        query_id: stable.query_id,
                    });
                }
                Err(e) => {
                    tracing::debug!("Cached bearer token rejected, bootstrapping again: {}", e);
                    self.invalidate().await;
                }
            }
        }

        let credentials = bootstrap(client, post, fallback_query_id).await?;
        *self.stable.write().await = Some(StableCredentials {
            bearer_token: credentials.bearer_token.clone(),
            query_id: credentials.query_id.clone(),
        });
        Ok(credentials)
    }

    /// Drop the cached bearer token and query id.
    pub async fn invalidate(&self) {
        *self.stable.write().await = None;
    }

    pub async fn is_cached(&self) -> bool {
        self.stable.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::Endpoints;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BEARER: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

    fn test_client(base: &str) -> XClient {
        XClient::new(
            "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/120.0".to_string(),
            Duration::from_secs(5),
            Endpoints::with_base(base),
        )
        .unwrap()
    }

    fn bundle_body() -> String {
        format!(
            r#"var a="{}";e.exports={{queryId:"Xl5pC_lBk_gcO2ItU39DQw",operationName:"TweetResultByRestId",operationType:"query"}}"#,
            BEARER
        )
    }

    #[test]
    fn test_find_redirect_prefers_meta_refresh() {
        let page = r#"<meta http-equiv="refresh" content="0; url = https://twitter.com/x/migrate?tok=abc123&amp;x=1" />
            <script>window.location.replace("https://other.example/")</script>"#;
        assert_eq!(
            find_redirect(page).as_deref(),
            Some("https://twitter.com/x/migrate?tok=abc123&x=1")
        );
    }

    #[test]
    fn test_find_redirect_script_fallback() {
        let page = r#"<script>window.location.replace("https://x.com/x/migrate?tok=zz")</script>"#;
        assert_eq!(
            find_redirect(page).as_deref(),
            Some("https://x.com/x/migrate?tok=zz")
        );
        assert_eq!(find_redirect("<html>plain</html>"), None);
    }

    #[test]
    fn test_find_tok_and_data() {
        assert_eq!(
            find_tok("https://x.com/x/migrate?tok=abc123&x=1").as_deref(),
            Some("abc123")
        );
        assert_eq!(find_tok("https://x.com/a/status/1"), None);
        let page = r#"<form><input type="hidden" name="data" value="payload42"></form>"#;
        assert_eq!(find_migrate_data(page).as_deref(), Some("payload42"));
    }

    #[test]
    fn test_find_bundle_url() {
        let page = r#"<script src="https://abs.twimg.com/responsive-web/client-web/main.5a8f1c2e.js" nonce="x"></script>"#;
        assert_eq!(
            find_bundle_url(page).as_deref(),
            Some("https://abs.twimg.com/responsive-web/client-web/main.5a8f1c2e.js")
        );
        let legacy = r#"src="https://abs.twimg.com/responsive-web/client-web-legacy/main.deadbeef.js""#;
        assert!(find_bundle_url(legacy).unwrap().contains("client-web-legacy"));
        assert_eq!(find_bundle_url("<html></html>"), None);
    }

    #[test]
    fn test_find_bearer_token() {
        assert_eq!(find_bearer_token(&bundle_body()).as_deref(), Some(BEARER));
        assert_eq!(
            find_bearer_token(r#"h="Bearer abcDEF123""#).as_deref(),
            Some("abcDEF123")
        );
        assert_eq!(find_bearer_token("nothing here"), None);
    }

    #[test]
    fn test_find_query_id_both_orders() {
        assert_eq!(
            find_query_id(&bundle_body()).as_deref(),
            Some("Xl5pC_lBk_gcO2ItU39DQw")
        );
        let name_first = r#"TweetResultByRestId:{queryId:"abcd1234",operationName:"x"}"#;
        assert_eq!(find_query_id(name_first).as_deref(), Some("abcd1234"));
        assert_eq!(find_query_id(r#"queryId:"zzz",operationName:"Other""#), None);
    }

    #[test]
    fn test_find_guest_cookie() {
        let page = r#"<script>document.cookie="gt=1712345678901234567; Max-Age=10800; Domain=.x.com";</script>"#;
        assert_eq!(find_guest_cookie(page).as_deref(), Some("1712345678901234567"));
        assert_eq!(find_guest_cookie("<html></html>"), None);
    }

    #[tokio::test]
    async fn test_bootstrap_direct_page_with_cookie() {
        let server = MockServer::start().await;
        let page = format!(
            r#"<html><script src="{}/responsive-web/client-web/main.abc123.js"></script>
            <script>document.cookie="gt=1234567890; Max-Age=10800";</script></html>"#,
            server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/someone/status/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/responsive-web/client-web/main.abc123.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string(bundle_body()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/1.1/guest/activate.json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let post = PostRef::new("someone", "42");
        let creds = bootstrap(&client, &post, "fallback").await.unwrap();

        assert_eq!(creds.bearer_token, BEARER);
        assert_eq!(creds.guest_token, "1234567890");
        assert_eq!(creds.query_id, "Xl5pC_lBk_gcO2ItU39DQw");
    }

    #[tokio::test]
    async fn test_bootstrap_redirect_migrate_and_activation() {
        let server = MockServer::start().await;
        let stub = format!(
            r#"<meta http-equiv="refresh" content="0; url = {}/landing?tok=tok987" />"#,
            server.uri()
        );
        let landing = r#"<form><input type="hidden" name="data" value="blob55"></form>"#;
        let migrated = format!(
            r#"<script src="{}/responsive-web/client-web-legacy/main.f00d.js"></script>"#,
            server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/someone/status/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(stub))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/landing"))
            .respond_with(ResponseTemplate::new(200).set_body_string(landing))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/x/migrate"))
            .and(body_string_contains("tok=tok987"))
            .and(body_string_contains("data=blob55"))
            .respond_with(ResponseTemplate::new(200).set_body_string(migrated))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/responsive-web/client-web-legacy/main.f00d.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(r#"x="{}""#, BEARER)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/1.1/guest/activate.json"))
            .and(header_eq("authorization", format!("Bearer {}", BEARER).as_str()))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"guest_token":"99887766"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let post = PostRef::new("someone", "42");
        let creds = bootstrap(&client, &post, "fallbackQid").await.unwrap();

        assert_eq!(creds.guest_token, "99887766");
        assert_eq!(creds.query_id, "fallbackQid");
    }

    #[tokio::test]
    async fn test_bootstrap_missing_bundle_names_step() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/someone/status/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>stub</html>"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let post = PostRef::new("someone", "42");
        let err = bootstrap(&client, &post, "q").await.unwrap_err();

        match err {
            Error::Credential { step, post_url, .. } => {
                assert_eq!(step, BootstrapStep::LocateBundle);
                assert_eq!(post_url, "https://x.com/someone/status/42");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_page_status_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/someone/status/42"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let post = PostRef::new("someone", "42");
        let err = bootstrap(&client, &post, "q").await.unwrap_err();

        assert!(matches!(
            err,
            Error::Credential {
                step: BootstrapStep::FetchPage,
                status: Some(403),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cache_reuses_bearer_with_fresh_guest_token() {
        let server = MockServer::start().await;
        let page = format!(
            r#"<script src="{}/responsive-web/client-web/main.abc123.js"></script>"#,
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/someone/status/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/responsive-web/client-web/main.abc123.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string(bundle_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/1.1/guest/activate.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"guest_token":"555"}"#))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let post = PostRef::new("someone", "42");
        let cache = CredentialCache::new();

        let first = cache.acquire(&client, &post, "q").await.unwrap();
        assert!(cache.is_cached().await);
        let second = cache.acquire(&client, &post, "q").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.guest_token, "555");

        cache.invalidate().await;
        assert!(!cache.is_cached().await);
    }
}
