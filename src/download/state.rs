//! Download state tracking.

use crate::media::item::MediaKind;

/// Statistics for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadStats {
    pub video_count: u64,
    pub gif_count: u64,
    pub pic_count: u64,
    pub failed_count: u64,
    /// Posts whose media was resolved (repost targets included).
    pub posts_resolved: u64,
}

impl DownloadStats {
    /// Record one written item.
    pub fn record(&mut self, kind: MediaKind) {
        match kind {
            MediaKind::Video => self.video_count += 1,
            MediaKind::AnimatedImage => self.gif_count += 1,
            MediaKind::Image => self.pic_count += 1,
        }
    }

    pub fn mark_failed(&mut self) {
        self.failed_count += 1;
    }

    /// Get total downloaded count.
    pub fn total_downloaded(&self) -> u64 {
        self.video_count + self.gif_count + self.pic_count
    }
}
