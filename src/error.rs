//! Error types for the twitter-video-dl application.

use std::fmt;

use thiserror::Error;

/// Bootstrap step that failed while acquiring credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStep {
    FetchPage,
    FollowRedirect,
    Migrate,
    LocateBundle,
    FetchBundle,
    BearerToken,
    GuestToken,
}

impl fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapStep::FetchPage => write!(f, "fetch post page"),
            BootstrapStep::FollowRedirect => write!(f, "follow page redirect"),
            BootstrapStep::Migrate => write!(f, "migrate handshake"),
            BootstrapStep::LocateBundle => write!(f, "locate client bundle"),
            BootstrapStep::FetchBundle => write!(f, "fetch client bundle"),
            BootstrapStep::BearerToken => write!(f, "extract bearer token"),
            BootstrapStep::GuestToken => write!(f, "obtain guest token"),
        }
    }
}

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors
    #[error("Invalid post URL '{url}': {reason}")]
    Input { url: String, reason: String },

    // Upstream protocol errors
    #[error("Credential bootstrap failed at step '{step}' for {post_url}: {message}{}", context(.url, .status))]
    Credential {
        step: BootstrapStep,
        post_url: String,
        url: Option<String>,
        status: Option<u16>,
        message: String,
    },

    #[error("Metadata unavailable for {post_url}: {message}{}", context(.url, .status))]
    Metadata {
        post_url: String,
        url: Option<String>,
        status: Option<u16>,
        message: String,
    },

    #[error("Unexpected upstream document shape for {post_url}: {message}{}", url_suffix(.url))]
    ProtocolShape {
        post_url: String,
        url: Option<String>,
        message: String,
    },

    #[error("Request to {url} failed for {post_url}: {message}{}", status_suffix(.status))]
    Transport {
        post_url: String,
        url: String,
        status: Option<u16>,
        message: String,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // Download errors
    #[error("Download failed: {0}")]
    Download(String),

    // File system errors
    #[error("Invalid filename (path traversal attempt): {0}")]
    InvalidFilename(String),

    // External tool errors
    #[error("FFmpeg error: {0}")]
    FFmpeg(String),

    #[error("FFmpeg not found. Please install ffmpeg and ensure it's in your PATH.")]
    FFmpegNotFound,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // URL parsing errors
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Render the optional `(url ..., HTTP status)` suffix of upstream errors.
fn context(url: &Option<String>, status: &Option<u16>) -> String {
    match (url, status) {
        (Some(url), Some(status)) => format!(" (url {}, HTTP {})", url, status),
        (Some(url), None) => format!(" (url {})", url),
        (None, Some(status)) => format!(" (HTTP {})", status),
        (None, None) => String::new(),
    }
}

fn url_suffix(url: &Option<String>) -> String {
    context(url, &None)
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl Error {
    /// Build a transport error from a non-success response.
    pub fn status(post_url: &str, url: &str, status: u16) -> Self {
        Error::Transport {
            post_url: post_url.to_string(),
            url: url.to_string(),
            status: Some(status),
            message: "unexpected HTTP status".to_string(),
        }
    }

    /// Build a transport error from a failed request.
    pub fn network(post_url: &str, url: &str, err: reqwest::Error) -> Self {
        Error::Transport {
            post_url: post_url.to_string(),
            url: url.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    /// HTTP status attached to this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::Credential { status, .. }
            | Error::Metadata { status, .. }
            | Error::Transport { status, .. } => *status,
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Sub-resource URL attached to this error, if any.
    pub fn resource_url(&self) -> Option<&str> {
        match self {
            Error::Credential { url, .. }
            | Error::Metadata { url, .. }
            | Error::ProtocolShape { url, .. } => url.as_deref(),
            Error::Transport { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit codes.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const API_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const DOWNLOAD_ERROR: i32 = 4;
    pub const UNEXPECTED_ERROR: i32 = 5;
    pub const INPUT_ERROR: i32 = 6;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_error_names_step_and_post() {
        let err = Error::Credential {
            step: BootstrapStep::FetchBundle,
            post_url: "https://x.com/a/status/1".into(),
            url: Some("https://abs.example/main.js".into()),
            status: Some(404),
            message: "unexpected HTTP status".into(),
        };
        let text = err.to_string();
        assert!(text.contains("fetch client bundle"));
        assert!(text.contains("https://x.com/a/status/1"));
        assert!(text.contains("HTTP 404"));
        assert_eq!(err.http_status(), Some(404));
        assert_eq!(err.resource_url(), Some("https://abs.example/main.js"));
    }

    #[test]
    fn test_transport_error_display() {
        let err = Error::status("https://x.com/a/status/1", "https://video.example/a.m4s", 503);
        assert!(err.to_string().contains("https://video.example/a.m4s"));
        assert!(err.to_string().contains("HTTP 503"));
    }
}
