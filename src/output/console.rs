//! Console output utilities.

use std::path::Path;

use console::style;

use crate::api::PostRef;
use crate::media::MediaKind;

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("INFO").cyan().bold(), message);
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", style("OK").green().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", style("WARN").yellow().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("ERROR").red().bold(), message);
}

/// Print the application banner.
pub fn print_banner() {
    let banner = r#"
╔═══════════════════════════════════════════════════════╗
║     twitter-video-dl                                  ║
║     Videos, GIFs and images from X/Twitter posts      ║
╚═══════════════════════════════════════════════════════╝
"#;
    println!("{}", style(banner).cyan());
}

/// Print the post being resolved and where its media goes.
pub fn print_config_summary(post: &PostRef, mode: &str, output_dir: &str) {
    println!();
    println!("{}", style("Request:").bold());
    println!("  Account: @{}", post.handle);
    println!("  Post:    {}", style(&post.id).cyan());
    println!("  Mode:    {}", mode);
    println!("  Output:  {}", output_dir);
    println!();
}

/// Report that the requested post re-shares media from another post.
pub fn print_repost(requested: &PostRef, original: &PostRef) {
    println!(
        "{} {} re-shares media from {}",
        style("REPOST").magenta().bold(),
        requested.id,
        style(&original.url).underlined()
    );
}

/// Report one written file.
pub fn print_saved(kind: MediaKind, path: &Path) {
    print_success(&format!("Saved {} {}", kind.label(), style(path.display()).dim()));
}
