//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted while cleaning a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Parallel executor lifecycle
    Executor(ExecutorEvent),
    /// Files moved into (or failing to reach) a destination tree
    Relocation(RelocationEvent),
    /// Train/valid/test split progress
    Split(SplitEvent),
}

/// Events from the chunked parallel executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutorEvent {
    /// Work was split and is about to be dispatched
    Started {
        chunks: usize,
        items: usize,
        backend: String,
    },
    /// A chunk task began running
    ChunkStarted { chunk_index: usize, items: usize },
    /// A chunk task produced a result
    ChunkCompleted { chunk_index: usize },
    /// A chunk task failed; other chunks are unaffected
    ChunkFailed { chunk_index: usize, message: String },
    /// Every chunk has completed or failed
    Completed {
        succeeded: usize,
        failed: usize,
        duration_ms: u64,
    },
}

/// Events from the file relocator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RelocationEvent {
    /// A flagged file was moved
    Relocated {
        source: PathBuf,
        destination: PathBuf,
        reason: String,
    },
    /// A file could not be processed or moved; the chunk continues
    Failed { path: PathBuf, message: String },
}

/// Events from the dataset splitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SplitEvent {
    /// A class directory is about to be split
    ClassStarted { class: String, files: usize },
    /// A class directory was drained into the split tree
    ClassCompleted {
        class: String,
        valid: usize,
        test: usize,
        train: usize,
    },
    /// All class directories were processed
    Completed { classes: usize, files: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Executor(ExecutorEvent::ChunkFailed {
            chunk_index: 2,
            message: "boom".to_string(),
        });

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Executor(ExecutorEvent::ChunkFailed { chunk_index, message }) => {
                assert_eq!(chunk_index, 2);
                assert_eq!(message, "boom");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn split_event_is_serializable() {
        let event = SplitEvent::ClassCompleted {
            class: "cat".to_string(),
            valid: 20,
            test: 10,
            train: 70,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"train\":70"));
    }
}
