//! # Dataset Cleaner
//!
//! Prepares class-per-folder image datasets for training.
//!
//! ## Operations
//! - **Quarantine corrupt images** - files that fail to decode move to a mirror tree
//! - **Separate non-RGB images** - grayscale, RGBA, CMYK, ... move aside
//! - **Split** - class folders become `train/`, `valid/` and `test/`
//!
//! ## Architecture
//! - `core` - The cleaning engine, built around a chunked parallel executor
//! - `events` - Channel-based progress reporting
//! - `error` - Typed error taxonomy
//! - `cli` (binary only) - Command-line interface

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{CleanerError, Result};

/// Initialize tracing for the library
///
/// Logs go to stderr: stdout of a worker process carries its task response.
/// Calling it again after a subscriber is installed has no effect.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
