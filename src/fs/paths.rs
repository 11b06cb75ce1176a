//! Path and directory management.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fs::naming::make_unique_filename;

/// Final path of an output file.
///
/// Without `overwrite`, an existing file is kept and a free numbered name is
/// returned instead.
pub fn output_path(dir: &Path, stem: &str, extension: &str, overwrite: bool) -> PathBuf {
    let path = dir.join(format!("{}.{}", stem, extension));
    if overwrite {
        path
    } else {
        make_unique_filename(&path)
    }
}

/// Hidden sibling used while a file is being written.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download");
    let parent = final_path.parent().unwrap_or(Path::new("."));
    parent.join(format!(".{}.{}.part", name, uuid::Uuid::new_v4().simple()))
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
