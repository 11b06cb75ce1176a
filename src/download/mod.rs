//! Download module for resolving and writing post media.
//!
//! This module provides:
//! - Repost detection
//! - Post resolution (single-target and fan-out)
//! - Fragmented video reassembly
//! - Media file downloading
//! - Download statistics

pub mod media;
pub mod repost;
pub mod resolve;
pub mod segments;
pub mod state;

pub use media::{MediaWriter, WriterOptions};
pub use repost::{find_all_repost_targets, find_repost_target};
pub use resolve::{ResolvedPost, Resolver};
pub use segments::SegmentReassembler;
pub use state::DownloadStats;
