//! Configuration validation and post URL parsing.

use std::sync::LazyLock;

use crate::api::PostRef;
use crate::config::loader::Config;
use crate::error::{Error, Result};
use regex::Regex;

/// Minimum length for user agent.
const MIN_USER_AGENT_LENGTH: usize = 40;

/// `https://<x.com|twitter.com>/<handle>/status/<digits>` with optional tail.
static POST_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(?:x\.com|twitter\.com)/([^/?#]+)/status/([^/?#]+)(?:[/?#].*)?$")
        .expect("post url pattern")
});

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_user_agent(&config.network.user_agent)?;

    if config.network.request_timeout_seconds == 0 {
        return Err(Error::ConfigValidation {
            field: "request_timeout_seconds".to_string(),
            message: "Timeout must be at least 1 second".to_string(),
        });
    }

    if config.options.max_concurrent_segments == 0 {
        return Err(Error::ConfigValidation {
            field: "max_concurrent_segments".to_string(),
            message: "At least one concurrent segment download is required".to_string(),
        });
    }

    if config.options.max_repost_depth == 0 {
        return Err(Error::ConfigValidation {
            field: "max_repost_depth".to_string(),
            message: "Repost depth must be at least 1".to_string(),
        });
    }

    if config.api.fallback_query_id.trim().is_empty() {
        return Err(Error::ConfigValidation {
            field: "fallback_query_id".to_string(),
            message: "Fallback GraphQL query id cannot be empty".to_string(),
        });
    }

    Ok(())
}

/// Validate the user agent string.
pub fn validate_user_agent(user_agent: &str) -> Result<()> {
    if user_agent.len() < MIN_USER_AGENT_LENGTH {
        return Err(Error::ConfigValidation {
            field: "user_agent".to_string(),
            message: format!(
                "User agent must be at least {} characters (got {}); upstream serves a stub page to non-browser clients",
                MIN_USER_AGENT_LENGTH,
                user_agent.len()
            ),
        });
    }

    Ok(())
}

/// Parse a post URL into a [`PostRef`].
///
/// Trailing slashes, query strings and `/video/1`-style suffixes are ignored.
/// Anything that is not a status URL on one of the two known hosts is an
/// input error; no network call is made.
pub fn parse_post_url(input: &str) -> Result<PostRef> {
    let input = input.trim();

    let invalid = |reason: &str| Error::Input {
        url: input.to_string(),
        reason: reason.to_string(),
    };

    let captures = POST_URL
        .captures(input)
        .ok_or_else(|| invalid("expected https://x.com/<user>/status/<id>"))?;

    let handle = &captures[1];
    let id = &captures[2];

    if !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("post id must be numeric"));
    }

    Ok(PostRef::new(handle, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_url_variants_share_id() {
        let inputs = [
            "https://x.com/someone/status/1650804112987136000",
            "https://x.com/someone/status/1650804112987136000/",
            "https://x.com/someone/status/1650804112987136000?s=20",
            "https://twitter.com/someone/status/1650804112987136000/video/1",
            "  https://twitter.com/someone/status/1650804112987136000  ",
        ];

        for input in inputs {
            let post = parse_post_url(input).unwrap();
            assert_eq!(post.id, "1650804112987136000", "input: {}", input);
            assert_eq!(post.handle, "someone");
            assert_eq!(
                post.url,
                "https://x.com/someone/status/1650804112987136000"
            );
        }
    }

    #[test]
    fn test_parse_post_url_non_numeric() {
        let err = parse_post_url("https://x.com/someone/status/not-a-number").unwrap_err();
        assert!(matches!(err, Error::Input { .. }));
    }

    #[test]
    fn test_parse_post_url_wrong_host_or_shape() {
        assert!(parse_post_url("https://example.com/someone/status/123").is_err());
        assert!(parse_post_url("https://x.com/someone").is_err());
        assert!(parse_post_url("http://x.com/someone/status/123").is_err());
        assert!(parse_post_url("").is_err());
    }

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_short_user_agent() {
        let mut config = Config::default();
        config.network.user_agent = "curl/8.0".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(Error::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.options.max_concurrent_segments = 0;
        assert!(validate_config(&config).is_err());
    }
}
