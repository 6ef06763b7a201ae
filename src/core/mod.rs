//! # Core Module
//!
//! The dataset cleaning engine.
//!
//! ## Modules
//! - `splitter` - Balanced, order-preserving chunking of work lists
//! - `executor` - Chunked parallel task executor (thread or process backed)
//! - `imaging` - Color mode and corruption probing
//! - `relocator` - Collision-safe file moves
//! - `workers` - Corruption scanner and RGB separator chunk workers
//! - `dataset` - Class directory listing and the train/valid/test splitter

pub mod dataset;
pub mod executor;
pub mod imaging;
pub mod relocator;
pub mod splitter;
pub mod workers;

// Re-export commonly used types
pub use dataset::{DatasetSplitter, ListingOrder, ScanOptions, SplitConfig, SplitReport};
pub use executor::{
    BackendKind, CancellationToken, ChunkWorker, ExecutionReport, ExecutorConfig, ParallelExecutor,
    ProcessBackend,
};
pub use imaging::{ColorMode, ImageProbe, ProbeConfig};
pub use relocator::Relocator;
pub use workers::{CorruptionScanner, RgbSeparator, WorkerReport};
