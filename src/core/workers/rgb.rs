//! RGB separator: moves images whose color mode is not RGB aside.

use super::{Sweep, Verdict, WorkerReport};
use crate::core::dataset::ScanOptions;
use crate::core::executor::{CancellationToken, ChunkWorker};
use crate::core::imaging::{ImageProbe, ProbeConfig};
use crate::core::relocator::Relocator;
use crate::error::WorkerError;
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Moves grayscale, RGBA, CMYK, ... images into `separation_root/<class>/`.
///
/// Files whose mode cannot be read stay in place and are reported as
/// failures; quarantining them is the corruption scanner's job.
#[derive(Serialize, Deserialize)]
pub struct RgbSeparator {
    probe: ImageProbe,
    separation_root: PathBuf,
    #[serde(default)]
    options: ScanOptions,
    #[serde(skip)]
    relocator: Relocator,
    #[serde(skip)]
    events: Option<EventSender>,
}

impl RgbSeparator {
    pub fn new(separation_root: impl Into<PathBuf>, probe: ProbeConfig) -> Self {
        Self {
            probe: ImageProbe::new(probe),
            separation_root: separation_root.into(),
            options: ScanOptions::default(),
            relocator: Relocator::new(),
            events: None,
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn separation_root(&self) -> &Path {
        &self.separation_root
    }
}

impl ChunkWorker for RgbSeparator {
    type Item = PathBuf;
    type Output = WorkerReport;
    type Error = WorkerError;

    const NAME: &'static str = "rgb-separator";

    fn process_chunk(
        &self,
        chunk_index: usize,
        chunk: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<WorkerReport, WorkerError> {
        debug!(chunk = chunk_index, classes = chunk.len(), "separating non-RGB images");

        let sweep = Sweep {
            destination_root: &self.separation_root,
            options: &self.options,
            relocator: &self.relocator,
            events: self.events.as_ref(),
            cancel,
        };

        sweep.run(chunk, |file| match self.probe.color_mode(file) {
            Ok(mode) if mode.is_rgb() => Ok(Verdict::Keep),
            Ok(mode) => Ok(Verdict::Flag(format!("color mode {}", mode))),
            Err(e) => Err(format!("could not read color mode: {}", e)),
        })
    }

    fn is_cancellation(error: &WorkerError) -> bool {
        matches!(error, WorkerError::Cancelled)
    }
}
