//! Upstream API module.
//!
//! This module provides:
//! - HTTP client with browser-like headers
//! - Anonymous credential bootstrap and caching
//! - Syndication and GraphQL metadata strategies
//! - API response types

pub mod auth;
pub mod client;
pub mod fetcher;
pub mod graphql;
pub mod syndication;
pub mod types;

pub use auth::{bootstrap, CredentialCache};
pub use client::{Endpoints, XClient};
pub use fetcher::{MetadataFetcher, MetadataSource, StrategyFailure};
pub use graphql::{GraphQlSource, RequestTemplate, TemplateCache, MAX_ATTEMPTS};
pub use syndication::SyndicationSource;
pub use types::*;
