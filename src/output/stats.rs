//! Statistics reporting.

use console::style;

use crate::download::DownloadStats;

/// Print statistics for a run.
pub fn print_stats(stats: &DownloadStats) {
    println!();
    println!("{}", style("═".repeat(50)).dim());
    println!("{}", style("Statistics:").bold());
    println!("  Posts resolved: {}", stats.posts_resolved);
    println!("  Videos:   {}", stats.video_count);
    println!("  GIFs:     {}", stats.gif_count);
    println!("  Pictures: {}", stats.pic_count);
    if stats.failed_count > 0 {
        println!("  Failed:   {}", style(stats.failed_count).red());
    }
    println!("  Total:    {} downloaded", stats.total_downloaded());
    println!("{}", style("═".repeat(50)).dim());
}
