//! Repost detection.
//!
//! A post that re-shares another post's video carries a
//! `"source_status_id_str"` next to the media entry, and the original post's
//! URL appears as an `"expanded_url"`. Replies are serialized after the first
//! `"conversationthread-` marker; single-target lookups ignore everything
//! past it.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::api::types::PostRef;
use crate::config::parse_post_url;

/// First reply-thread entry in a GraphQL body.
pub const REPLY_BOUNDARY: &str = "\"conversationthread-";

static SOURCE_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""source_status_id_str"\s*:\s*"(\d+)""#).expect("source status pattern")
});

/// The part of a document that belongs to the post itself.
fn before_replies(text: &str) -> &str {
    match text.find(REPLY_BOUNDARY) {
        Some(idx) => &text[..idx],
        None => text,
    }
}

/// Find the original post URL for a source status id.
fn expanded_url_for(text: &str, source_id: &str) -> Option<PostRef> {
    let pattern = format!(
        r#""expanded_url"\s*:\s*"(https://(?:x\.com|twitter\.com)/[^/"]+/status/{}[^"]*)""#,
        regex::escape(source_id)
    );
    let re = Regex::new(&pattern).ok()?;

    let found = re
        .captures_iter(text)
        .filter_map(|c| parse_post_url(&c[1]).ok())
        .find(|post| post.id == source_id);
    found
}

/// Original post re-shared by this post, ignoring replies.
pub fn find_repost_target(text: &str) -> Option<PostRef> {
    let own = before_replies(text);
    let source_id = SOURCE_STATUS.captures(own)?.get(1)?.as_str().to_string();

    let target = expanded_url_for(own, &source_id);
    if target.is_none() {
        tracing::debug!("Repost of {} has no expanded_url", source_id);
    }
    target
}

/// Every distinct original post referenced by this post and its replies, in
/// first-seen order.
pub fn find_all_repost_targets(text: &str) -> Vec<PostRef> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for captures in SOURCE_STATUS.captures_iter(text) {
        let source_id = &captures[1];
        if !seen.insert(source_id.to_string()) {
            continue;
        }

        match expanded_url_for(text, source_id) {
            Some(post) => targets.push(post),
            None => tracing::debug!("Repost of {} has no expanded_url", source_id),
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repost_entry(id: &str, handle: &str) -> String {
        format!(
            r#"{{"media_url_https":"https://pbs.twimg.com/ext_tw_video_thumb/{id}/pu/img/t.jpg","source_status_id_str":"{id}","expanded_url":"https://twitter.com/{handle}/status/{id}/video/1"}}"#
        )
    }

    #[test]
    fn test_no_marker() {
        let text = r#"{"legacy":{"full_text":"hello"}}"#;
        assert!(find_repost_target(text).is_none());
        assert!(find_all_repost_targets(text).is_empty());
    }

    #[test]
    fn test_single_target() {
        let text = format!(r#"{{"media":[{}]}}"#, repost_entry("1641086559037579264", "orig"));
        let target = find_repost_target(&text).unwrap();
        assert_eq!(target.id, "1641086559037579264");
        assert_eq!(target.handle, "orig");
        assert_eq!(target.url, "https://x.com/orig/status/1641086559037579264");
    }

    #[test]
    fn test_single_target_ignores_replies() {
        let text = format!(
            r#"{{"own":{{}},"entryId":"conversationthread-99","reply":{}}}"#,
            repost_entry("555", "replier")
        );
        assert!(find_repost_target(&text).is_none());
        assert_eq!(find_all_repost_targets(&text).len(), 1);
    }

    #[test]
    fn test_fan_out_deduplicates() {
        let text = format!(
            r#"{{"a":{},"entryId":"conversationthread-1","b":{},"c":{}}}"#,
            repost_entry("100", "alpha"),
            repost_entry("100", "alpha"),
            repost_entry("200", "beta")
        );

        let targets = find_all_repost_targets(&text);
        let ids: Vec<_> = targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["100", "200"]);
    }

    #[test]
    fn test_expanded_url_must_match_id_exactly() {
        let text = r#"{"source_status_id_str":"12","expanded_url":"https://x.com/u/status/123/video/1"}"#;
        assert!(find_repost_target(text).is_none());
    }
}
