//! Command-line argument definitions using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// X/Twitter media downloader CLI.
#[derive(Parser, Debug)]
#[command(
    name = "twitter-video-dl",
    version,
    about = "Download videos, GIFs and images from X/Twitter posts",
    long_about = "Resolve a public X/Twitter post URL into its media and download it.\n\n\
                  Reposted videos are followed to the original post. With --all, every\n\
                  video re-shared by the post and its replies is downloaded."
)]
pub struct Args {
    /// Post URL, e.g. https://x.com/<user>/status/<id>.
    pub url: String,

    /// Base name of the output files (default: "output").
    pub file_name: Option<String>,

    /// Directory for downloaded files.
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Download every repost target found in the post and its replies.
    #[arg(short, long)]
    pub all: bool,

    /// Only download the first video of the post.
    #[arg(long, conflicts_with = "all")]
    pub first: bool,

    /// Don't download still images.
    #[arg(long)]
    pub no_images: bool,

    /// Convert animated images to .gif (requires ffmpeg).
    #[arg(long)]
    pub gif: bool,

    /// Overwrite existing files instead of picking a new name.
    #[arg(long)]
    pub overwrite: bool,

    /// Browser user agent string.
    #[arg(long = "user-agent", env = "TWITTER_VIDEO_DL_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Path to configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    /// Merge CLI arguments into an existing config, overriding where specified.
    pub fn merge_into_config(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.options.output_directory = dir.clone();
        }

        if let Some(user_agent) = &self.user_agent {
            config.network.user_agent = user_agent.clone();
        }

        // Boolean flags (only override if set to non-default)
        if self.no_images {
            config.options.save_images = false;
        }

        if self.gif {
            config.options.convert_gif = true;
        }

        if self.overwrite {
            config.options.overwrite = true;
        }
    }
}
