//! Configuration module for twitter-video-dl.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - Configuration validation
//! - Post URL parsing

pub mod loader;
pub mod validation;

pub use loader::{ApiConfig, Config, NetworkConfig, OptionsConfig, DEFAULT_FALLBACK_QUERY_ID};
pub use validation::{parse_post_url, validate_config};
