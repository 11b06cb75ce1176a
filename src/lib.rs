//! twitter-video-dl - resolve X/Twitter posts into downloadable media
//!
//! This library turns a public post URL into the videos, animated images and
//! images attached to it.
//!
//! # Features
//!
//! - Anonymous credential bootstrap (bearer, guest token, GraphQL query id)
//! - Syndication metadata with authenticated GraphQL fallback
//! - Self-healing GraphQL request template
//! - Repost redirects and fan-out over replies
//! - Fragmented MP4 reassembly
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use twitter_video_dl::api::{CredentialCache, MetadataFetcher, TemplateCache, XClient};
//! use twitter_video_dl::download::Resolver;
//! use twitter_video_dl::media::MediaExtractor;
//! use twitter_video_dl::{Config, PostRef};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let client = Arc::new(XClient::from_config(&config)?);
//!     let fetcher = MetadataFetcher::standard(
//!         client,
//!         Arc::new(CredentialCache::new()),
//!         Arc::new(TemplateCache::in_memory()),
//!         config.api.fallback_query_id.clone(),
//!     );
//!     let resolver = Resolver::new(Arc::new(fetcher), MediaExtractor::new(true), 5);
//!
//!     let post: PostRef = "https://x.com/someone/status/1650804112987136000".parse()?;
//!     let resolved = resolver.resolve(&post).await?;
//!     for video in &resolved.media.videos {
//!         println!("{}", video.url);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod fs;
pub mod media;
pub mod output;

// Re-exports for convenience
pub use api::{Credentials, MetadataFetcher, PostRef, RawDocument, XClient};
pub use config::Config;
pub use download::{DownloadStats, MediaWriter, ResolvedPost, Resolver};
pub use error::{Error, Result};
pub use media::{MediaCandidate, MediaExtractor, MediaKind, ResolutionResult};
