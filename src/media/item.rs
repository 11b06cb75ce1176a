//! Media item representation.

use std::sync::LazyLock;

use regex::Regex;

static DIMENSIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+)x(\d+)/").expect("dimensions pattern"));

/// Kind of resolved media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    AnimatedImage,
    Image,
}

impl MediaKind {
    /// Label used in progress output.
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::AnimatedImage => "animated image",
            MediaKind::Image => "image",
        }
    }
}

/// One encoded rendition, only used while choosing the best one.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MediaVariant {
    pub url: String,
    pub content_type: String,
    pub bitrate: Option<u64>,
    pub width: u32,
    pub height: u32,
}

impl MediaVariant {
    pub(crate) fn new(url: &str, content_type: &str, bitrate: Option<u64>) -> Self {
        let (width, height) = dimensions_from_url(url).unwrap_or((0, 0));
        Self {
            url: url.to_string(),
            content_type: content_type.to_string(),
            bitrate,
            width,
            height,
        }
    }
}

/// A downloadable media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCandidate {
    pub kind: MediaKind,
    pub url: String,
    /// The URL is a streaming manifest rather than a single file.
    pub is_fragmented: bool,
}

impl MediaCandidate {
    pub fn video(url: &str) -> Self {
        Self {
            kind: MediaKind::Video,
            url: url.to_string(),
            is_fragmented: is_fragmented_url(url),
        }
    }

    pub fn animated_image(url: &str) -> Self {
        Self {
            kind: MediaKind::AnimatedImage,
            ..Self::video(url)
        }
    }

    pub fn image(url: &str) -> Self {
        Self {
            kind: MediaKind::Image,
            url: url.to_string(),
            is_fragmented: false,
        }
    }

    /// File extension (without dot) for this item.
    ///
    /// Animated images stay `mp4` unless GIF conversion is requested.
    pub fn extension(&self, convert_gif: bool) -> &'static str {
        match self.kind {
            MediaKind::Video => "mp4",
            MediaKind::AnimatedImage if convert_gif => "gif",
            MediaKind::AnimatedImage => "mp4",
            MediaKind::Image => "jpg",
        }
    }
}

/// Media found in one post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionResult {
    /// Videos and animated images, in document order.
    pub videos: Vec<MediaCandidate>,
    /// Still images, in document order.
    pub images: Vec<MediaCandidate>,
    pub is_animated_image: bool,
}

impl ResolutionResult {
    pub fn is_empty(&self) -> bool {
        self.videos.is_empty() && self.images.is_empty()
    }

    /// "The" video when only one is wanted.
    pub fn first_video(&self) -> Option<&MediaCandidate> {
        self.videos.first()
    }

    /// Total number of items.
    pub fn len(&self) -> usize {
        self.videos.len() + self.images.len()
    }

    /// Videos first, then images.
    pub fn items(&self) -> impl Iterator<Item = &MediaCandidate> {
        self.videos.iter().chain(self.images.iter())
    }
}

/// Whether a URL has the fragmented-manifest shape.
pub fn is_fragmented_url(url: &str) -> bool {
    url.contains("container=fmp4") || url.contains(".m3u8")
}

/// Width and height from a `/<W>x<H>/` path segment.
pub fn dimensions_from_url(url: &str) -> Option<(u32, u32)> {
    let captures = DIMENSIONS.captures(url)?;
    Some((captures[1].parse().ok()?, captures[2].parse().ok()?))
}
