//! # Error Module
//!
//! Error types for the dataset cleaner.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, chunk indices, what went wrong
//! - **Corrupt is not fatal** - a file that fails to decode is quarantined, not raised
//! - **Configuration errors surface first** - before any file is touched

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum CleanerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dataset split error: {0}")]
    Split(#[from] SplitError),

    #[error("Worker task error: {0}")]
    Task(String),
}

/// Errors raised synchronously before any work begins
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid split ratios: valid {val_ratio} + test {test_ratio} must be within 0..=1")]
    InvalidRatio { val_ratio: f64, test_ratio: f64 },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Failed to list directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build worker pool: {0}")]
    PoolBuild(String),
}

/// Why an image was classified as corrupt.
///
/// Every variant means "quarantine this file"; the variant only exists so
/// logs and tests can tell the failure kinds apart.
#[derive(Error, Debug)]
pub enum CorruptError {
    #[error("Failed to open image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Image is truncated beyond tolerance: {path}")]
    Truncated { path: PathBuf },

    #[error("Malformed embedded metadata in {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },
}

impl CorruptError {
    /// Short machine-readable label for the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            CorruptError::Open { .. } => "open",
            CorruptError::Decode { .. } => "decode",
            CorruptError::Truncated { .. } => "truncated",
            CorruptError::Metadata { .. } => "metadata",
        }
    }
}

/// Errors that occur while moving a file into a destination tree
#[derive(Error, Debug)]
pub enum RelocateError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source has no file name: {path}")]
    InvalidSource { path: PathBuf },

    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Copy verification failed for {path}: source {expected} bytes, dest {actual} bytes")]
    CopyVerification {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

/// Errors that occur while splitting a dataset into train/valid/test
#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Failed to read class directory {path}: {source}")]
    ReadClass {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {path} into the split tree: {source}")]
    Move {
        path: PathBuf,
        #[source]
        source: RelocateError,
    },

    #[error("Failed to remove drained class directory {path}: {source}")]
    RemoveClass {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that escape a chunk worker and fail its whole chunk
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to list class directory {path}: {source}")]
    ListClass {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stopped by cancellation")]
    Cancelled,
}

/// Why a single chunk did not produce a result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkErrorKind {
    #[error("worker failed: {0}")]
    Failed(String),

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("worker process failed: {0}")]
    Process(String),
}

/// A failure captured at the executor boundary for one chunk
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("chunk {chunk_index}: {kind}")]
pub struct ChunkError {
    /// Position of the failed chunk in submission order
    pub chunk_index: usize,
    pub kind: ChunkErrorKind,
}

impl ChunkError {
    pub fn new(chunk_index: usize, kind: ChunkErrorKind) -> Self {
        Self { chunk_index, kind }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ChunkErrorKind::Cancelled
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, CleanerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_ratio_includes_values() {
        let error = ConfigError::InvalidRatio {
            val_ratio: 0.7,
            test_ratio: 0.5,
        };
        let message = error.to_string();
        assert!(message.contains("0.7"));
        assert!(message.contains("0.5"));
    }

    #[test]
    fn corrupt_error_includes_path() {
        let error = CorruptError::Decode {
            path: PathBuf::from("/data/cat/broken.jpg"),
            reason: "invalid JPEG".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("/data/cat/broken.jpg"));
        assert!(message.contains("invalid JPEG"));
        assert_eq!(error.kind(), "decode");
    }

    #[test]
    fn relocation_failures_surface_through_the_split() {
        let relocate = RelocateError::InvalidSource {
            path: PathBuf::from("/"),
        };
        let error: CleanerError = SplitError::Move {
            path: PathBuf::from("/data/cat/a.png"),
            source: relocate,
        }
        .into();

        assert!(matches!(error, CleanerError::Split(SplitError::Move { .. })));
        assert!(error.to_string().contains("/data/cat/a.png"));
    }

    #[test]
    fn chunk_error_names_its_chunk() {
        let error = ChunkError::new(3, ChunkErrorKind::Failed("boom".to_string()));
        assert_eq!(error.to_string(), "chunk 3: worker failed: boom");
        assert!(!error.is_cancelled());
        assert!(ChunkError::new(0, ChunkErrorKind::Cancelled).is_cancelled());
    }
}
