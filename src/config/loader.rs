//! Configuration structures and loading logic.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Last known-good id of the `TweetResultByRestId` GraphQL operation.
///
/// Used when the client bundle no longer exposes the id. Upstream rotates it
/// occasionally, so it lives here rather than in the fetch logic.
pub const DEFAULT_FALLBACK_QUERY_ID: &str = "0hWvDhmW8YQ-S_ib3azIrw";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub options: OptionsConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

/// Output options configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionsConfig {
    /// Directory that receives downloaded files.
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    /// Whether to collect and save still images.
    #[serde(default = "default_true")]
    pub save_images: bool,

    /// Whether to convert animated images to .gif with ffmpeg.
    #[serde(default)]
    pub convert_gif: bool,

    /// Log level passed to ffmpeg.
    #[serde(default = "default_ffmpeg_loglevel")]
    pub ffmpeg_loglevel: String,

    /// Whether to overwrite existing files instead of picking a unique name.
    #[serde(default)]
    pub overwrite: bool,

    /// Maximum concurrent fragment downloads per video.
    #[serde(default = "default_max_concurrent_segments")]
    pub max_concurrent_segments: usize,

    /// Maximum number of repost hops followed from the requested post.
    #[serde(default = "default_max_repost_depth")]
    pub max_repost_depth: usize,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            save_images: true,
            convert_gif: false,
            ffmpeg_loglevel: default_ffmpeg_loglevel(),
            overwrite: false,
            max_concurrent_segments: default_max_concurrent_segments(),
            max_repost_depth: default_max_repost_depth(),
        }
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Browser user agent string. A non-browser agent gets a stub page.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// GraphQL operation id used when the client bundle does not reveal one.
    #[serde(default = "default_fallback_query_id")]
    pub fallback_query_id: String,

    /// Where the self-healed `{features, variables}` template is persisted.
    #[serde(default)]
    pub request_template_cache: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            fallback_query_id: default_fallback_query_id(),
            request_template_cache: None,
        }
    }
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("./output")
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:84.0) Gecko/20100101 Firefox/84.0".to_string()
}

fn default_ffmpeg_loglevel() -> String {
    "error".to_string()
}

fn default_fallback_query_id() -> String {
    DEFAULT_FALLBACK_QUERY_ID.to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_segments() -> usize {
    4
}

fn default_max_repost_depth() -> usize {
    5
}

fn default_request_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "Configuration file not found: {}. Create one from config.example.toml",
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout_seconds)
    }
}
