//! Filename generation and manipulation.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default output stem when no file name is given.
pub const DEFAULT_STEM: &str = "output";

/// Validate and sanitize a filename by removing or replacing invalid characters.
///
/// Returns an error if the filename contains path traversal patterns.
pub fn sanitize_filename(name: &str) -> Result<String> {
    // Reject path traversal attempts
    if name.contains("..") {
        return Err(Error::InvalidFilename(format!(
            "Path traversal detected: '{}'",
            name
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(Error::InvalidFilename(format!(
            "Path separators not allowed in filename: '{}'",
            name
        )));
    }

    if name.contains('\0') {
        return Err(Error::InvalidFilename(format!(
            "Null bytes not allowed in filename: '{}'",
            name
        )));
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.trim().is_empty() {
        return Err(Error::InvalidFilename(
            "Filename cannot be empty or whitespace-only".to_string(),
        ));
    }

    Ok(sanitized)
}

/// Output stem for a user-supplied file name.
///
/// A trailing media extension is dropped so `clip.mp4` and `clip` name the
/// same outputs.
pub fn output_stem(file_name: Option<&str>) -> Result<String> {
    let Some(name) = file_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(DEFAULT_STEM.to_string());
    };

    let stem = [".mp4", ".gif", ".jpg"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name);

    sanitize_filename(stem)
}

/// Stem of the `index`-th (1-based) of `total` outputs.
///
/// A single output keeps the bare stem; several are numbered `<stem>_<n>`.
pub fn numbered_stem(stem: &str, index: usize, total: usize) -> String {
    if total > 1 {
        format!("{}_{}", stem, index)
    } else {
        stem.to_string()
    }
}

/// Generate a unique filename by appending a number if the file exists.
pub fn make_unique_filename(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    let mut counter = 1;
    loop {
        let new_name = if ext.is_empty() {
            format!("{} ({})", stem, counter)
        } else {
            format!("{} ({}).{}", stem, counter, ext)
        };

        let new_path = parent.join(&new_name);
        if !new_path.exists() {
            return new_path;
        }

        counter += 1;
        if counter > 1000 {
            return new_path;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_valid() {
        assert_eq!(sanitize_filename("normal").unwrap(), "normal");
        assert_eq!(sanitize_filename("file:name").unwrap(), "file_name");
        assert_eq!(
            sanitize_filename("file*with?special").unwrap(),
            "file_with_special"
        );
    }

    #[test]
    fn test_sanitize_filename_rejects() {
        assert!(sanitize_filename("../etc/passwd").is_err());
        assert!(sanitize_filename("path/to/file").is_err());
        assert!(sanitize_filename("path\\to\\file").is_err());
        assert!(sanitize_filename("file\0name").is_err());
        assert!(sanitize_filename("   ").is_err());
    }

    #[test]
    fn test_output_stem() {
        assert_eq!(output_stem(None).unwrap(), "output");
        assert_eq!(output_stem(Some("")).unwrap(), "output");
        assert_eq!(output_stem(Some("clip.mp4")).unwrap(), "clip");
        assert_eq!(output_stem(Some("clip")).unwrap(), "clip");
        assert!(output_stem(Some("../clip")).is_err());
    }

    #[test]
    fn test_numbered_stem() {
        assert_eq!(numbered_stem("output", 1, 1), "output");
        assert_eq!(numbered_stem("output", 1, 3), "output_1");
        assert_eq!(numbered_stem("clip", 3, 3), "clip_3");
    }

    #[test]
    fn test_make_unique_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.mp4");
        assert_eq!(make_unique_filename(&path), path);

        std::fs::write(&path, b"x").unwrap();
        assert_eq!(make_unique_filename(&path), dir.path().join("output (1).mp4"));
    }
}
