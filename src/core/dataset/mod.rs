//! # Dataset Module
//!
//! Directory listing for class-per-folder datasets and the single-threaded
//! train/valid/test splitter.
//!
//! ## Layout
//! ```text
//! root/
//!   cat/      <- class subdirectory
//!   dog/
//! ```

mod split;

pub use split::{ClassSplit, DatasetSplitter, SplitConfig, SplitCounts, SplitReport, SPLIT_DIRS};

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How files inside a class subdirectory are enumerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Descend into nested directories inside a class
    pub recursive: bool,
    /// Include dot-files
    pub include_hidden: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            include_hidden: true,
        }
    }
}

/// Order in which directory entries are returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingOrder {
    /// Whatever order the filesystem returns (not reproducible across runs)
    #[default]
    Directory,
    /// Sorted by file name
    Name,
}

/// Class subdirectories directly under `root`, sorted by name.
///
/// Directories listed in `exclude` (typically a quarantine tree that lives
/// inside the dataset) are skipped.
pub fn list_class_dirs(root: &Path, exclude: &[PathBuf]) -> Result<Vec<PathBuf>, ConfigError> {
    if !root.is_dir() {
        return Err(ConfigError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let read_error = |e| ConfigError::ReadDirectory {
        path: root.to_path_buf(),
        source: e,
    };
    let excluded: Vec<PathBuf> = exclude.iter().map(|p| normalize(p)).collect();

    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        if path.is_dir() && !excluded.contains(&normalize(&path)) {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Files of one class subdirectory, in listing order
pub fn list_files(dir: &Path, options: &ScanOptions) -> io::Result<Vec<PathBuf>> {
    let files = if options.recursive {
        collect_files(dir)?
    } else {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files
    };

    Ok(files
        .into_iter()
        .filter(|path| options.include_hidden || !is_hidden(path))
        .collect())
}

/// Every file below `path` (or `path` itself when it is a file)
pub fn collect_files(path: &Path) -> io::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Direct children of `dir` in the requested order
pub fn list_entries(dir: &Path, order: ListingOrder) -> io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        entries.push(entry?.path());
    }
    if order == ListingOrder::Name {
        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    }
    Ok(entries)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
