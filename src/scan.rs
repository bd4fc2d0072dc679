//! Directory scanner: finds JPEG files below a root directory.
//!
//! The scanner is lazy: nothing beyond the root is touched until the
//! iterator is driven. Every call to [`ImageScanner::iter`] starts a new walk,
//! so a scan can be re-run from scratch but never resumed halfway.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// Recognized image suffixes, compared case-insensitively against the final
/// path segment.
const IMAGE_SUFFIXES: &[&str] = &[".jpg", ".jpeg"];

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Cannot access directory {path}: {source}")]
    DirectoryAccess {
        path: String,
        source: std::io::Error,
    },

    #[error("Not a directory: {0}")]
    NotADirectory(String),
}

/// Whether the final segment of `path` ends in one of [`IMAGE_SUFFIXES`].
pub fn is_image_path(path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy().to_ascii_lowercase();
    IMAGE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

#[derive(Debug, Clone)]
pub struct ImageScanner {
    root: PathBuf,
}

impl ImageScanner {
    /// Validate the root and return a scanner for it.
    ///
    /// This is the only place a scan fails: problems below the root are
    /// logged and skipped while iterating.
    pub fn open(root: &Path) -> Result<Self, ScanError> {
        let metadata = std::fs::metadata(root).map_err(|source| ScanError::DirectoryAccess {
            path: root.display().to_string(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root.display().to_string()));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh walk, yielding image paths in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| !entry.file_type().is_dir())
            .filter(|entry| is_image_path(entry.path()))
            .map(walkdir::DirEntry::into_path)
    }
}

impl<'a> IntoIterator for &'a ImageScanner {
    type Item = PathBuf;
    type IntoIter = Box<dyn Iterator<Item = PathBuf> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
