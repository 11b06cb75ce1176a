//! Media parsing utilities.
//!
//! A post-detail document comes in one of several layouts depending on the
//! strategy that produced it and the kind of post. Each layout has its own
//! parser; parsers are tried in a fixed order and the first one that finds
//! media wins. A document no parser understands yields an empty result.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::api::types::{
    BindingValue, DocumentSource, MediaEntity, RawDocument, SyndicationPhoto, UnifiedCard,
    VariantInfo,
};
use crate::media::item::{MediaCandidate, MediaVariant, ResolutionResult};

static DIRECT_MP4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"https://video\.twimg\.com/(?:amplify_video|ext_tw_video)/(\d+)(?:/pu)?/vid/(?:avc1/)?(\d+)x(\d+)/[^."\s]+\.mp4(?:\?tag=\d+)?"#,
    )
    .expect("direct mp4 pattern")
});

static TWEET_VIDEO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https://video\.twimg\.com/tweet_video/[^"\s]+"#).expect("tweet video pattern")
});

static FRAGMENTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https://video\.twimg\.com/[^"\s]*container=fmp4"#).expect("fragmented pattern")
});

static MEDIA_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(?:amplify_video|ext_tw_video)/(\d+)/").expect("media id pattern")
});

const MP4: &str = "video/mp4";
const MPEG_URL: &str = "application/x-mpegURL";

/// Known document layouts, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentShape {
    /// Syndication `mediaDetails` / `photos`.
    SyndicationMedia,
    /// Syndication promoted card with an embedded `unified_card` blob.
    SyndicationCard,
    /// GraphQL `legacy.extended_entities` or `legacy.entities`.
    EntityMedia,
    /// GraphQL `card.legacy.binding_values`.
    CardBindings,
    /// Direct CDN URLs found anywhere in the body.
    UrlScan,
}

impl DocumentShape {
    fn for_source(source: DocumentSource) -> &'static [DocumentShape] {
        match source {
            DocumentSource::Syndication => {
                &[DocumentShape::SyndicationMedia, DocumentShape::SyndicationCard]
            }
            DocumentSource::GraphQl => &[
                DocumentShape::EntityMedia,
                DocumentShape::CardBindings,
                DocumentShape::UrlScan,
            ],
        }
    }
}

/// Turns raw documents into ranked media candidates.
#[derive(Debug, Clone, Copy)]
pub struct MediaExtractor {
    save_images: bool,
}

impl MediaExtractor {
    /// `save_images` gates collection of still images.
    pub fn new(save_images: bool) -> Self {
        Self { save_images }
    }

    /// Extract all media from a document.
    pub fn extract(&self, document: &RawDocument) -> ResolutionResult {
        for shape in DocumentShape::for_source(document.source) {
            if let Some(result) = self.parse(*shape, document) {
                tracing::debug!(
                    "{:?} layout: {} video(s), {} image(s)",
                    shape,
                    result.videos.len(),
                    result.images.len()
                );
                return result;
            }
        }

        tracing::debug!("No media layout matched for {}", document.post.id);
        ResolutionResult::default()
    }

    fn parse(&self, shape: DocumentShape, document: &RawDocument) -> Option<ResolutionResult> {
        let result = match shape {
            DocumentShape::SyndicationMedia => self.syndication_media(&document.json),
            DocumentShape::SyndicationCard => syndication_card(&document.json),
            DocumentShape::EntityMedia => self.entity_media(graphql_result(&document.json)?),
            DocumentShape::CardBindings => card_bindings(graphql_result(&document.json)?),
            DocumentShape::UrlScan => url_scan(&document.text, &document.post.id),
        };

        result.filter(|r| !r.is_empty())
    }

    fn syndication_media(&self, root: &Value) -> Option<ResolutionResult> {
        let entities = entity_list(root.get("mediaDetails"));
        let mut result = collect_videos(&entities);

        if self.save_images {
            let photos: Vec<SyndicationPhoto> = root
                .get("photos")
                .and_then(|p| serde_json::from_value(p.clone()).ok())
                .unwrap_or_default();

            result.images = if photos.is_empty() {
                photo_candidates(&entities)
            } else {
                photos
                    .iter()
                    .filter_map(|p| p.url.as_deref())
                    .map(MediaCandidate::image)
                    .collect()
            };
        }

        Some(result)
    }

    fn entity_media(&self, tweet: &Value) -> Option<ResolutionResult> {
        let legacy = tweet.get("legacy")?;
        let media = legacy
            .pointer("/extended_entities/media")
            .or_else(|| legacy.pointer("/entities/media"));

        let entities = entity_list(media);
        if entities.is_empty() {
            return None;
        }

        let mut result = collect_videos(&entities);
        if self.save_images {
            result.images = photo_candidates(&entities);
        }
        Some(result)
    }
}

/// The post object of a GraphQL document, unwrapping visibility wrappers.
fn graphql_result(root: &Value) -> Option<&Value> {
    let result = root.pointer("/data/tweetResult/result")?;
    Some(result.get("tweet").unwrap_or(result))
}

fn syndication_card(root: &Value) -> Option<ResolutionResult> {
    let blob = root
        .pointer("/card/binding_values/unified_card/string_value")?
        .as_str()?;
    unified_card_videos(blob)
}

fn card_bindings(tweet: &Value) -> Option<ResolutionResult> {
    let bindings: Vec<BindingValue> =
        serde_json::from_value(tweet.pointer("/card/legacy/binding_values")?.clone()).ok()?;

    let mut result = ResolutionResult::default();
    for blob in bindings
        .iter()
        .filter_map(|b| b.value.as_ref()?.string_value.as_deref())
    {
        if let Some(found) = unified_card_videos(blob) {
            result.is_animated_image |= found.is_animated_image;
            result.videos.extend(found.videos);
        }
    }
    Some(result)
}

fn unified_card_videos(blob: &str) -> Option<ResolutionResult> {
    let card: UnifiedCard = match serde_json::from_str(blob) {
        Ok(card) => card,
        Err(e) => {
            tracing::debug!("Skipping card value that is not a media card: {}", e);
            return None;
        }
    };

    let entities: Vec<MediaEntity> = card
        .media_entities
        .values()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect();
    Some(collect_videos(&entities))
}

/// Id of the media attached to `post_id`, taken from the `id_str` that follows
/// the post's own `expanded_url`.
fn associated_media_id(text: &str, post_id: &str) -> Option<String> {
    let pattern = format!(
        r#""expanded_url"\s*:\s*"https://(?:x\.com|twitter\.com)/[^/"]+/status/{}/[^"]+",\s*"id_str"\s*:\s*"(\d+)""#,
        regex::escape(post_id)
    );
    let re = Regex::new(&pattern).ok()?;
    let id = re.captures(text).map(|c| c[1].to_string());
    id
}

/// Scan raw text for CDN video URLs, keeping the largest rendition per media id.
///
/// When the post's own media id is known, only URLs carrying it are kept,
/// unless none do.
fn url_scan(text: &str, post_id: &str) -> Option<ResolutionResult> {
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, MediaVariant> = HashMap::new();

    for captures in DIRECT_MP4.captures_iter(text) {
        let id = captures[1].to_string();
        let variant = MediaVariant::new(&captures[0], MP4, None);
        let area = u64::from(variant.width) * u64::from(variant.height);

        match best.get(&id) {
            Some(current) if u64::from(current.width) * u64::from(current.height) >= area => {}
            Some(_) => {
                best.insert(id, variant);
            }
            None => {
                order.push(id.clone());
                best.insert(id, variant);
            }
        }
    }

    let mut result = ResolutionResult::default();
    for id in &order {
        if let Some(variant) = best.get(id) {
            result.videos.push(MediaCandidate::video(&variant.url));
        }
    }

    for m in FRAGMENTED.find_iter(text) {
        let covered = MEDIA_ID
            .captures(m.as_str())
            .is_some_and(|c| best.contains_key(&c[1]));
        if !covered && !result.videos.iter().any(|v| v.url == m.as_str()) {
            result.videos.push(MediaCandidate::video(m.as_str()));
        }
    }

    if let Some(media_id) = associated_media_id(text, post_id) {
        if result.videos.iter().any(|v| v.url.contains(&media_id)) {
            tracing::debug!("Keeping URLs of media {} only", media_id);
            result.videos.retain(|v| v.url.contains(&media_id));
        }
    }

    if result.videos.is_empty() {
        for m in TWEET_VIDEO.find_iter(text) {
            if !result.videos.iter().any(|v| v.url == m.as_str()) {
                result.videos.push(MediaCandidate::animated_image(m.as_str()));
                result.is_animated_image = true;
            }
        }
    }

    Some(result)
}

fn entity_list(value: Option<&Value>) -> Vec<MediaEntity> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn collect_videos(entities: &[MediaEntity]) -> ResolutionResult {
    let mut result = ResolutionResult::default();

    for entity in entities {
        let Some(info) = &entity.video_info else {
            continue;
        };
        let Some((variant, no_bitrate)) = select_variant(&info.variants) else {
            continue;
        };

        if no_bitrate || entity.kind == "animated_gif" {
            result.videos.push(MediaCandidate::animated_image(&variant.url));
            result.is_animated_image = true;
        } else {
            result.videos.push(MediaCandidate::video(&variant.url));
        }
    }

    result
}

fn photo_candidates(entities: &[MediaEntity]) -> Vec<MediaCandidate> {
    entities
        .iter()
        .filter(|e| e.kind == "photo")
        .filter_map(|e| e.media_url_https.as_deref())
        .map(MediaCandidate::image)
        .collect()
}

/// Pick the rendition to download.
///
/// Among `video/mp4` variants the strictly highest positive bitrate wins, ties
/// going to the first one seen. When no mp4 variant reports a positive
/// bitrate the first mp4 is kept and the second value is `true` (animated
/// image). Without any mp4 the first streaming manifest is used.
pub(crate) fn select_variant(variants: &[VariantInfo]) -> Option<(MediaVariant, bool)> {
    let mut best: Option<&VariantInfo> = None;
    let mut first_mp4: Option<&VariantInfo> = None;

    for variant in variants.iter().filter(|v| v.content_type == MP4) {
        first_mp4.get_or_insert(variant);

        let bitrate = variant.bitrate.unwrap_or(0);
        if bitrate > best.and_then(|b| b.bitrate).unwrap_or(0) {
            best = Some(variant);
        }
    }

    let to_variant = |v: &VariantInfo| MediaVariant::new(&v.url, &v.content_type, v.bitrate);

    if let Some(variant) = best {
        return Some((to_variant(variant), false));
    }
    if let Some(variant) = first_mp4 {
        return Some((to_variant(variant), true));
    }

    variants
        .iter()
        .find(|v| v.content_type.eq_ignore_ascii_case(MPEG_URL))
        .map(|v| (to_variant(v), false))
}
