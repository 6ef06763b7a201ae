//! Positional train/valid/test split of class subdirectories.
//!
//! For each class with `n` entries: the first `floor(n * val_ratio)` go to
//! `valid/<class>/`, the next `floor(n * test_ratio)` to `test/<class>/`,
//! the rest to `train/<class>/`. Nothing is shuffled; callers that want a
//! random split shuffle before calling.

use super::{list_entries, ListingOrder};
use crate::core::relocator::Relocator;
use crate::error::{CleanerError, ConfigError, SplitError};
use crate::events::{null_sender, Event, EventSender, SplitEvent};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Output directory names; never treated as classes
pub const SPLIT_DIRS: [&str; 3] = ["train", "valid", "test"];

const RATIO_EPSILON: f64 = 1e-9;

/// Ratios and listing order for a split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub val_ratio: f64,
    pub test_ratio: f64,
    pub order: ListingOrder,
}

impl SplitConfig {
    pub fn new(val_ratio: f64, test_ratio: f64) -> Self {
        Self {
            val_ratio,
            test_ratio,
            order: ListingOrder::Directory,
        }
    }

    pub fn order(mut self, order: ListingOrder) -> Self {
        self.order = order;
        self
    }

    /// Both ratios within `0..=1` and their sum at most 1
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = |r: f64| r.is_finite() && (0.0..=1.0).contains(&r);
        if !in_range(self.val_ratio)
            || !in_range(self.test_ratio)
            || self.val_ratio + self.test_ratio > 1.0 + RATIO_EPSILON
        {
            return Err(ConfigError::InvalidRatio {
                val_ratio: self.val_ratio,
                test_ratio: self.test_ratio,
            });
        }
        Ok(())
    }

    /// How `n` entries of one class are divided
    pub fn counts(&self, n: usize) -> SplitCounts {
        let valid = ((n as f64 * self.val_ratio).floor() as usize).min(n);
        let test = ((n as f64 * self.test_ratio).floor() as usize).min(n - valid);
        SplitCounts {
            valid,
            test,
            train: n - valid - test,
        }
    }
}

/// Number of entries sent to each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub valid: usize,
    pub test: usize,
    pub train: usize,
}

/// Result for one class directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSplit {
    pub class: String,
    pub counts: SplitCounts,
    /// False when the source directory could not be removed (still had entries)
    pub removed: bool,
}

/// Result of a whole split run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitReport {
    pub classes: Vec<ClassSplit>,
    /// Existing train/valid/test directories that were left alone
    pub skipped: Vec<String>,
    pub duration_ms: u64,
}

impl SplitReport {
    pub fn total_files(&self) -> usize {
        self.classes
            .iter()
            .map(|c| c.counts.valid + c.counts.test + c.counts.train)
            .sum()
    }
}

/// Single-threaded directory-to-directory partitioner
pub struct DatasetSplitter {
    config: SplitConfig,
    relocator: Relocator,
    events: EventSender,
}

impl DatasetSplitter {
    pub fn new(config: SplitConfig) -> Self {
        Self {
            config,
            relocator: Relocator::new(),
            events: null_sender(),
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    /// Split every class directory under `root` in place.
    ///
    /// Ratios and `root` are validated before anything moves.
    pub fn split(&self, root: &Path) -> Result<SplitReport, CleanerError> {
        self.config.validate()?;
        if !root.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: root.to_path_buf(),
            }
            .into());
        }

        let start = Instant::now();
        let mut classes = Vec::new();
        let mut skipped = Vec::new();

        let class_dirs = list_entries(root, ListingOrder::Name).map_err(|e| ConfigError::ReadDirectory {
            path: root.to_path_buf(),
            source: e,
        })?;

        for class_dir in class_dirs.into_iter().filter(|p| p.is_dir()) {
            let Some(class_name) = class_dir.file_name().map(OsStr::to_os_string) else {
                continue;
            };
            // Lossy form is for reports and events only
            let class = class_name.to_string_lossy().into_owned();

            if SPLIT_DIRS.iter().any(|dir| class_name.as_os_str() == OsStr::new(dir)) {
                info!(dir = %class_dir.display(), "already a split directory, leaving it alone");
                skipped.push(class);
                continue;
            }

            classes.push(self.split_class(root, &class_dir, &class_name, class)?);
        }

        let report = SplitReport {
            classes,
            skipped,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            classes = report.classes.len(),
            files = report.total_files(),
            duration_ms = report.duration_ms,
            "dataset split complete"
        );
        self.events.send(Event::Split(SplitEvent::Completed {
            classes: report.classes.len(),
            files: report.total_files(),
        }));

        Ok(report)
    }

    fn split_class(
        &self,
        root: &Path,
        class_dir: &Path,
        class_name: &OsStr,
        class: String,
    ) -> Result<ClassSplit, SplitError> {
        let entries: Vec<PathBuf> = list_entries(class_dir, self.config.order)
            .map_err(|e| SplitError::ReadClass {
                path: class_dir.to_path_buf(),
                source: e,
            })?
            .into_iter()
            .filter(|p| p.is_file())
            .collect();

        let counts = self.config.counts(entries.len());
        self.events.send(Event::Split(SplitEvent::ClassStarted {
            class: class.clone(),
            files: entries.len(),
        }));

        let (valid, rest) = entries.split_at(counts.valid);
        let (test, train) = rest.split_at(counts.test);

        for (files, split_name) in [(valid, "valid"), (test, "test"), (train, "train")] {
            let destination = root.join(split_name).join(class_name);
            for file in files {
                self.relocator
                    .relocate(file, &destination)
                    .map_err(|e| SplitError::Move {
                        path: file.clone(),
                        source: e,
                    })?;
            }
        }

        let removed = match fs::remove_dir(class_dir) {
            Ok(()) => true,
            Err(e) if class_dir.read_dir().map(|mut d| d.next().is_some()).unwrap_or(false) => {
                warn!(dir = %class_dir.display(), error = %e, "class directory not empty after split, keeping it");
                false
            }
            Err(e) => {
                return Err(SplitError::RemoveClass {
                    path: class_dir.to_path_buf(),
                    source: e,
                })
            }
        };

        info!(
            class = %class,
            valid = counts.valid,
            test = counts.test,
            train = counts.train,
            "class split"
        );
        self.events.send(Event::Split(SplitEvent::ClassCompleted {
            class: class.clone(),
            valid: counts.valid,
            test: counts.test,
            train: counts.train,
        }));

        Ok(ClassSplit {
            class,
            counts,
            removed,
        })
    }
}
