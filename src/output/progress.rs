//! Progress indicators for the resolve and download stages.

use indicatif::{ProgressBar, ProgressStyle};

use crate::api::PostRef;

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .expect("spinner template"),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}

/// Spinner shown while a post's metadata is fetched and its reposts followed.
pub fn create_resolve_spinner(post: &PostRef, fan_out: bool) -> ProgressBar {
    if fan_out {
        spinner(format!("Resolving @{} {} and every re-shared video...", post.handle, post.id))
    } else {
        spinner(format!("Resolving @{} {}...", post.handle, post.id))
    }
}

/// Byte progress of one direct download, labelled with the output file name.
pub fn create_download_bar(total: u64, file_name: &str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .expect("download bar template")
            .progress_chars("#>-"),
    );
    bar.set_message(file_name.to_string());
    bar
}

/// File progress of one fragmented video: the init container plus every fragment.
///
/// The length is set once the playlist is known.
pub fn create_fragment_bar(file_name: &str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} files")
            .expect("fragment bar template")
            .progress_chars("#>-"),
    );
    bar.set_message(file_name.to_string());
    bar
}
