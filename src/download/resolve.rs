//! Post resolution: metadata, repost redirects and media extraction.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::api::fetcher::MetadataFetcher;
use crate::api::types::PostRef;
use crate::download::repost::{find_all_repost_targets, find_repost_target};
use crate::error::Result;
use crate::media::item::ResolutionResult;
use crate::media::parser::MediaExtractor;

/// Repost targets resolved at the same time in fan-out mode.
pub const FAN_OUT_CONCURRENCY: usize = 3;

/// Media resolved for one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPost {
    /// The post the media actually belongs to.
    pub post: PostRef,
    pub media: ResolutionResult,
}

/// Drives the fetch, repost and extract stages for a post.
pub struct Resolver {
    fetcher: Arc<MetadataFetcher>,
    extractor: MediaExtractor,
    max_depth: usize,
}

impl Resolver {
    pub fn new(fetcher: Arc<MetadataFetcher>, extractor: MediaExtractor, max_depth: usize) -> Self {
        Self {
            fetcher,
            extractor,
            max_depth,
        }
    }

    /// Resolve a post, following repost redirects to the original post.
    ///
    /// Redirects stop at an already visited id or after `max_depth` hops; the
    /// current document's own media is used in both cases.
    pub async fn resolve(&self, post: &PostRef) -> Result<ResolvedPost> {
        let mut visited = HashSet::new();
        let mut current = post.clone();
        let mut hops = 0;

        loop {
            visited.insert(current.id.clone());
            let document = self.fetcher.fetch(&current).await?;

            match find_repost_target(&document.text) {
                Some(target) if visited.contains(&target.id) => {
                    tracing::warn!(
                        "Repost cycle at {} -> {}, using {}'s own media",
                        current.id,
                        target.id,
                        current.id
                    );
                }
                Some(_) if hops >= self.max_depth => {
                    tracing::warn!(
                        "Repost chain longer than {} hops at {}, using its own media",
                        self.max_depth,
                        current.id
                    );
                }
                Some(target) => {
                    tracing::info!("{} re-shares {}, resolving the original", current.id, target.id);
                    current = target;
                    hops += 1;
                    continue;
                }
                None => {}
            }

            let media = self.extractor.extract(&document);
            tracing::debug!("{} has {} media item(s)", current.id, media.len());
            return Ok(ResolvedPost {
                post: current,
                media,
            });
        }
    }

    /// Resolve every distinct repost target referenced by a post and its
    /// replies, then the post's own media.
    ///
    /// Targets are resolved independently in single-target mode. The first
    /// failure aborts the whole fan-out. Own media already produced by a
    /// target is not repeated.
    pub async fn resolve_all(&self, post: &PostRef) -> Result<Vec<ResolvedPost>> {
        let document = self.fetcher.fetch(post).await?;

        let targets: Vec<PostRef> = find_all_repost_targets(&document.text)
            .into_iter()
            .filter(|target| target.id != post.id)
            .collect();
        tracing::info!("{} references {} repost target(s)", post.id, targets.len());

        let mut resolved: Vec<ResolvedPost> = stream::iter(targets)
            .map(|target| async move { self.resolve(&target).await })
            .buffered(FAN_OUT_CONCURRENCY)
            .try_collect()
            .await?;

        let seen: HashSet<String> = resolved
            .iter()
            .flat_map(|r| r.media.items().map(|item| item.url.clone()))
            .collect();

        let mut own = self.extractor.extract(&document);
        own.videos.retain(|item| !seen.contains(&item.url));
        own.images.retain(|item| !seen.contains(&item.url));

        if !own.is_empty() {
            resolved.push(ResolvedPost {
                post: post.clone(),
                media: own,
            });
        }

        Ok(resolved)
    }
}
