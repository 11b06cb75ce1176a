//! Filesystem module.
//!
//! Provides:
//! - Output directory management
//! - Output file naming

pub mod naming;
pub mod paths;

pub use naming::{make_unique_filename, numbered_stem, output_stem, sanitize_filename};
pub use paths::{ensure_dir, output_path, temp_path};
