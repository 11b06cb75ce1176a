//! Output module for console output and progress.
//!
//! Provides:
//! - Colored console output
//! - Progress bars
//! - Statistics reporting

pub mod console;
pub mod progress;
pub mod stats;

pub use console::{
    print_banner, print_config_summary, print_error, print_info, print_repost, print_saved,
    print_success, print_warning,
};
pub use progress::{create_download_bar, create_fragment_bar, create_resolve_spinner};
pub use stats::print_stats;
