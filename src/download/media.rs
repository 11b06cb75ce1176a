//! Media file downloading.
//!
//! Every file is written to a hidden temporary sibling and renamed into place
//! only once complete, so a failed download never leaves a finished-looking
//! file behind.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::api::client::XClient;
use crate::config::Config;
use crate::download::resolve::ResolvedPost;
use crate::download::segments::SegmentReassembler;
use crate::download::state::DownloadStats;
use crate::error::{Error, Result};
use crate::fs::{ensure_dir, numbered_stem, output_path, output_stem, temp_path};
use crate::media::{MediaCandidate, MediaKind};
use crate::output::{create_download_bar, create_fragment_bar, print_saved, print_warning};

/// Minimum file size to show progress bar (20 MB).
const PROGRESS_THRESHOLD: u64 = 20 * 1024 * 1024;

/// How and where files are written.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub output_dir: PathBuf,
    /// User-supplied base name; `output` when absent.
    pub file_name: Option<String>,
    pub convert_gif: bool,
    pub ffmpeg_loglevel: String,
    pub overwrite: bool,
    /// Only write the first video of each post.
    pub first_video_only: bool,
}

impl WriterOptions {
    pub fn from_config(config: &Config, file_name: Option<&str>, first_video_only: bool) -> Self {
        Self {
            output_dir: config.options.output_directory.clone(),
            file_name: file_name.map(str::to_string),
            convert_gif: config.options.convert_gif,
            ffmpeg_loglevel: config.options.ffmpeg_loglevel.clone(),
            overwrite: config.options.overwrite,
            first_video_only,
        }
    }
}

/// Writes resolved media to disk.
pub struct MediaWriter {
    client: Arc<XClient>,
    reassembler: SegmentReassembler,
    options: WriterOptions,
    stem: String,
}

impl MediaWriter {
    pub fn new(
        client: Arc<XClient>,
        reassembler: SegmentReassembler,
        options: WriterOptions,
    ) -> Result<Self> {
        let stem = output_stem(options.file_name.as_deref())?;
        Ok(Self {
            client,
            reassembler,
            options,
            stem,
        })
    }

    /// Write every item of the resolved posts.
    ///
    /// Videos and images are numbered separately and sequentially across all
    /// posts. A failed item is reported and counted; the rest are still written.
    pub async fn write_all(
        &self,
        posts: &[ResolvedPost],
        stats: &mut DownloadStats,
    ) -> Result<Vec<PathBuf>> {
        ensure_dir(&self.options.output_dir)?;

        let mut videos = Vec::new();
        let mut images = Vec::new();
        for resolved in posts {
            if self.options.first_video_only {
                videos.extend(resolved.media.first_video().map(|item| (resolved, item)));
            } else {
                videos.extend(resolved.media.videos.iter().map(|item| (resolved, item)));
            }
            images.extend(resolved.media.images.iter().map(|item| (resolved, item)));
        }

        let mut written = Vec::new();
        for group in [&videos, &images] {
            let total = group.len();
            for (index, (resolved, item)) in group.iter().enumerate() {
                let stem = numbered_stem(&self.stem, index + 1, total);

                match self.write_item(&resolved.post.url, item, &stem).await {
                    Ok(path) => {
                        stats.record(item.kind);
                        print_saved(item.kind, &path);
                        written.push(path);
                    }
                    Err(e) => {
                        stats.mark_failed();
                        tracing::error!("Failed to write {}: {}", item.url, e);
                        print_warning(&format!("Failed to download {}: {}", item.url, e));
                    }
                }
            }
        }

        Ok(written)
    }

    /// Download one item to `<output_dir>/<stem>.<ext>`.
    pub async fn write_item(
        &self,
        post_url: &str,
        item: &MediaCandidate,
        stem: &str,
    ) -> Result<PathBuf> {
        let extension = item.extension(self.options.convert_gif);
        let final_path = output_path(
            &self.options.output_dir,
            stem,
            extension,
            self.options.overwrite,
        );
        let temp = temp_path(&final_path);

        let result = self.write_to(post_url, item, &temp, &final_path).await;
        if result.is_err() {
            let _ = fs::remove_file(&temp).await;
        }
        result?;

        Ok(final_path)
    }

    async fn write_to(
        &self,
        post_url: &str,
        item: &MediaCandidate,
        temp: &Path,
        final_path: &Path,
    ) -> Result<()> {
        if item.is_fragmented {
            let bar = create_fragment_bar(&file_label(final_path));
            let bytes = self.reassembler.reassemble(post_url, &item.url, &bar).await;
            bar.finish_and_clear();
            fs::write(temp, bytes?).await?;
        } else {
            self.download_direct(post_url, &item.url, temp, &file_label(final_path))
                .await?;
        }

        if item.kind == MediaKind::AnimatedImage && self.options.convert_gif {
            let gif_temp = temp_path(final_path);
            let converted = convert_to_gif(temp, &gif_temp, &self.options.ffmpeg_loglevel).await;
            let _ = fs::remove_file(temp).await;

            if let Err(e) = converted {
                let _ = fs::remove_file(&gif_temp).await;
                return Err(e);
            }
            if let Err(e) = fs::rename(&gif_temp, final_path).await {
                let _ = fs::remove_file(&gif_temp).await;
                return Err(e.into());
            }
            return Ok(());
        }

        fs::rename(temp, final_path).await?;
        Ok(())
    }

    /// Stream a single file to `output_path`.
    async fn download_direct(
        &self,
        post_url: &str,
        url: &str,
        output_path: &Path,
        label: &str,
    ) -> Result<()> {
        let response = self.client.download_file(post_url, url).await?;

        let content_length = response.content_length();
        let progress = content_length
            .filter(|l| *l > PROGRESS_THRESHOLD)
            .map(|total| create_download_bar(total, label));

        let mut file = File::create(output_path).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::network(post_url, url, e))?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if let Some(ref pb) = progress {
                pb.set_position(downloaded);
            }
        }

        file.flush().await?;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        Ok(())
    }
}

/// File name shown next to a progress bar.
fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Convert an mp4 to a gif with ffmpeg.
async fn convert_to_gif(input: &Path, output: &Path, loglevel: &str) -> Result<()> {
    let input_str = input
        .to_str()
        .ok_or_else(|| Error::FFmpeg("Invalid path encoding for input".into()))?;
    let output_str = output
        .to_str()
        .ok_or_else(|| Error::FFmpeg("Invalid path encoding for output".into()))?;

    let status = Command::new("ffmpeg")
        .args([
            "-y", "-loglevel", loglevel, "-i", input_str, "-f", "gif", output_str,
        ])
        .stdout(Stdio::null())
        .status()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FFmpegNotFound
            } else {
                Error::FFmpeg(format!("Failed to run ffmpeg: {}", e))
            }
        })?;

    if !status.success() {
        return Err(Error::FFmpeg(format!("ffmpeg exited with {}", status)));
    }

    tracing::debug!("Converted {} to gif", input.display());
    Ok(())
}
