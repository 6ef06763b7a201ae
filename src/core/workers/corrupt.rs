//! Corruption scanner: quarantines files that fail validation.

use super::{Sweep, Verdict, WorkerReport};
use crate::core::dataset::ScanOptions;
use crate::core::executor::{CancellationToken, ChunkWorker};
use crate::core::imaging::{ImageProbe, ProbeConfig};
use crate::core::relocator::Relocator;
use crate::error::WorkerError;
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Moves every file that fails to open, decode or parse its EXIF into
/// `quarantine_root/<class>/`
#[derive(Serialize, Deserialize)]
pub struct CorruptionScanner {
    probe: ImageProbe,
    quarantine_root: PathBuf,
    #[serde(default)]
    options: ScanOptions,
    #[serde(skip)]
    relocator: Relocator,
    #[serde(skip)]
    events: Option<EventSender>,
}

impl CorruptionScanner {
    pub fn new(quarantine_root: impl Into<PathBuf>, probe: ProbeConfig) -> Self {
        Self {
            probe: ImageProbe::new(probe),
            quarantine_root: quarantine_root.into(),
            options: ScanOptions::default(),
            relocator: Relocator::new(),
            events: None,
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Report each relocation as it happens (thread backend only)
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn quarantine_root(&self) -> &Path {
        &self.quarantine_root
    }
}

impl ChunkWorker for CorruptionScanner {
    type Item = PathBuf;
    type Output = WorkerReport;
    type Error = WorkerError;

    const NAME: &'static str = "corruption-scanner";

    fn process_chunk(
        &self,
        chunk_index: usize,
        chunk: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<WorkerReport, WorkerError> {
        debug!(chunk = chunk_index, classes = chunk.len(), "scanning for corrupt images");

        let sweep = Sweep {
            destination_root: &self.quarantine_root,
            options: &self.options,
            relocator: &self.relocator,
            events: self.events.as_ref(),
            cancel,
        };

        sweep.run(chunk, |file| match self.probe.check(file) {
            Ok(_) => Ok(Verdict::Keep),
            Err(corrupt) => {
                warn!(path = %file.display(), kind = corrupt.kind(), "corrupt image: {}", corrupt);
                Ok(Verdict::Flag(corrupt.to_string()))
            }
        })
    }

    fn is_cancellation(error: &WorkerError) -> bool {
        matches!(error, WorkerError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn dataset() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let cat = temp.path().join("data").join("cat");
        fs::create_dir_all(&cat).unwrap();
        RgbImage::from_pixel(8, 8, Rgb([10, 20, 30]))
            .save(cat.join("good.png"))
            .unwrap();
        fs::write(cat.join("bad.png"), b"not a png").unwrap();
        (temp, cat)
    }

    #[test]
    fn corrupt_files_are_quarantined_by_class() {
        let (temp, cat) = dataset();
        let quarantine = temp.path().join("corrupt_img");
        let scanner = CorruptionScanner::new(&quarantine, ProbeConfig::default());

        let report = scanner
            .process_chunk(0, &[cat.clone()], &CancellationToken::new())
            .unwrap();

        assert_eq!(report.files_checked, 2);
        assert_eq!(report.relocated.len(), 1);
        assert!(cat.join("good.png").exists());
        assert!(!cat.join("bad.png").exists());
        assert!(quarantine.join("cat").join("bad.png").exists());
        assert!(report.relocated[0].reason.contains("decode"));
    }

    #[test]
    fn truncated_images_stay_unless_strict() {
        let temp = TempDir::new().unwrap();
        let cat = temp.path().join("cat");
        fs::create_dir_all(&cat).unwrap();
        let whole = temp.path().join("whole.jpg");
        RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 64]))
            .save(&whole)
            .unwrap();
        let bytes = fs::read(&whole).unwrap();
        fs::write(cat.join("cut.jpg"), &bytes[..bytes.len() / 2]).unwrap();
        let quarantine = temp.path().join("corrupt_img");

        let lenient = CorruptionScanner::new(&quarantine, ProbeConfig::default())
            .process_chunk(0, &[cat.clone()], &CancellationToken::new())
            .unwrap();
        assert!(lenient.relocated.is_empty());
        assert!(cat.join("cut.jpg").exists());

        let strict = ProbeConfig {
            tolerate_truncated: false,
            ..ProbeConfig::default()
        };
        let report = CorruptionScanner::new(&quarantine, strict)
            .process_chunk(0, &[cat.clone()], &CancellationToken::new())
            .unwrap();
        assert_eq!(report.relocated.len(), 1);
        assert!(quarantine.join("cat").join("cut.jpg").exists());
    }

    #[test]
    fn missing_class_dir_fails_the_chunk() {
        let temp = TempDir::new().unwrap();
        let scanner = CorruptionScanner::new(temp.path().join("q"), ProbeConfig::default());

        let result = scanner.process_chunk(0, &[temp.path().join("ghost")], &CancellationToken::new());
        assert!(matches!(result, Err(WorkerError::ListClass { .. })));
    }

    #[test]
    fn cancellation_stops_between_files() {
        let (temp, cat) = dataset();
        let scanner = CorruptionScanner::new(temp.path().join("q"), ProbeConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = scanner.process_chunk(0, &[cat.clone()], &cancel);
        assert!(matches!(result, Err(WorkerError::Cancelled)));
        assert!(cat.join("bad.png").exists());
    }

    #[test]
    fn scanner_survives_json_round_trip() {
        let scanner = CorruptionScanner::new("/tmp/q", ProbeConfig::default());
        let json = serde_json::to_value(&scanner).unwrap();
        let back: CorruptionScanner = serde_json::from_value(json).unwrap();
        assert_eq!(back.quarantine_root(), Path::new("/tmp/q"));
    }
}
