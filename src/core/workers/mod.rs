//! # Workers Module
//!
//! Chunk workers run by the parallel executor. A chunk is a list of class
//! subdirectories; each worker walks their files, asks a per-file predicate
//! whether to flag the file, and relocates flagged files into a tree that
//! mirrors the class layout.
//!
//! - [`CorruptionScanner`] - quarantines files that fail decode or metadata checks
//! - [`RgbSeparator`] - moves non-RGB images aside
//!
//! A file is either left in place or moved exactly once. Per-file problems
//! are recorded in the [`WorkerReport`]; only failing to list a class
//! directory fails the chunk.

mod corrupt;
mod rgb;

pub use corrupt::CorruptionScanner;
pub use rgb::RgbSeparator;

use crate::core::dataset::{list_files, ScanOptions};
use crate::core::executor::{serve_task, CancellationToken, ChunkWorker, TaskRequest, TaskResponse};
use crate::core::relocator::Relocator;
use crate::error::WorkerError;
use crate::events::{Event, EventSender, RelocationEvent};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file that was moved out of its class directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub reason: String,
}

/// A file that could not be checked or moved; it stays where it was
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Per-chunk worker output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Class directories fully processed
    pub classes: usize,
    /// Files inspected
    pub files_checked: usize,
    pub relocated: Vec<Relocation>,
    pub failures: Vec<FileFailure>,
}

impl WorkerReport {
    /// Fold another chunk's report into this one
    pub fn merge(&mut self, other: WorkerReport) {
        self.classes += other.classes;
        self.files_checked += other.files_checked;
        self.relocated.extend(other.relocated);
        self.failures.extend(other.failures);
    }
}

/// What a per-file predicate decided
pub(crate) enum Verdict {
    Keep,
    Flag(String),
}

/// State shared by every class-directory worker
pub(crate) struct Sweep<'a> {
    pub destination_root: &'a Path,
    pub options: &'a ScanOptions,
    pub relocator: &'a Relocator,
    pub events: Option<&'a EventSender>,
    pub cancel: &'a CancellationToken,
}

impl Sweep<'_> {
    /// Visit every file of every class in `chunk`, relocating flagged ones
    pub fn run<F>(&self, chunk: &[PathBuf], mut inspect: F) -> Result<WorkerReport, WorkerError>
    where
        F: FnMut(&Path) -> Result<Verdict, String>,
    {
        let mut report = WorkerReport::default();

        for class_dir in chunk {
            let files = list_files(class_dir, self.options).map_err(|e| WorkerError::ListClass {
                path: class_dir.clone(),
                source: e,
            })?;
            let class_name = class_dir.file_name().unwrap_or_default();
            debug!(class = %class_dir.display(), files = files.len(), "sweeping class");

            for file in files {
                if self.cancel.is_cancelled() {
                    return Err(WorkerError::Cancelled);
                }
                report.files_checked += 1;

                match inspect(&file) {
                    Ok(Verdict::Keep) => {}
                    Ok(Verdict::Flag(reason)) => {
                        let destination = mirrored_dir(self.destination_root, class_dir, class_name, &file);
                        self.relocate(&file, &destination, reason, &mut report);
                    }
                    Err(message) => {
                        warn!(path = %file.display(), "{}", message);
                        self.failed(&file, message, &mut report);
                    }
                }
            }
            report.classes += 1;
        }

        Ok(report)
    }

    fn relocate(&self, file: &Path, destination: &Path, reason: String, report: &mut WorkerReport) {
        match self.relocator.relocate(file, destination) {
            Ok(landed) => {
                if let Some(events) = self.events {
                    events.send(Event::Relocation(RelocationEvent::Relocated {
                        source: file.to_path_buf(),
                        destination: landed.clone(),
                        reason: reason.clone(),
                    }));
                }
                report.relocated.push(Relocation {
                    source: file.to_path_buf(),
                    destination: landed,
                    reason,
                });
            }
            Err(e) => {
                warn!(path = %file.display(), error = %e, "relocation failed");
                self.failed(file, e.to_string(), report);
            }
        }
    }

    fn failed(&self, file: &Path, message: String, report: &mut WorkerReport) {
        if let Some(events) = self.events {
            events.send(Event::Relocation(RelocationEvent::Failed {
                path: file.to_path_buf(),
                message: message.clone(),
            }));
        }
        report.failures.push(FileFailure {
            path: file.to_path_buf(),
            message,
        });
    }
}

/// `destination_root/<class>/<nested dirs of file>`
fn mirrored_dir(
    destination_root: &Path,
    class_dir: &Path,
    class_name: &std::ffi::OsStr,
    file: &Path,
) -> PathBuf {
    let mut dir = destination_root.join(class_name);
    if let Some(nested) = file.parent().and_then(|p| p.strip_prefix(class_dir).ok()) {
        dir.push(nested);
    }
    dir
}

/// Run a task received by a worker process with the worker it names
pub fn dispatch_task(request: TaskRequest) -> TaskResponse {
    if request.worker == CorruptionScanner::NAME {
        serve_task::<CorruptionScanner>(request)
    } else if request.worker == RgbSeparator::NAME {
        serve_task::<RgbSeparator>(request)
    } else {
        let message = format!("unknown worker '{}'", request.worker);
        TaskResponse::failed(request.chunk_index, message)
    }
}
