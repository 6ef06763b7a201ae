//! Integration tests for the parallel cleanup sweeps.
//!
//! These tests verify end-to-end behavior including:
//! - Corrupt images quarantined into a class-mirrored tree
//! - Non-RGB images separated without touching RGB ones
//! - A failing class directory only failing its own chunk
//! - The process backend running the real binary as its worker

use dataset_cleaner::core::dataset::list_class_dirs;
use dataset_cleaner::core::{
    BackendKind, CorruptionScanner, ExecutorConfig, ParallelExecutor, ProbeConfig, ProcessBackend,
    RgbSeparator, WorkerReport,
};
use dataset_cleaner::events::{Event, EventChannel, ExecutorEvent};
use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Build `root/<class>/` with two good images and one broken file per class
fn create_dataset(root: &Path, classes: &[&str]) {
    for class in classes {
        let dir = root.join(class);
        fs::create_dir_all(&dir).unwrap();
        RgbImage::from_pixel(16, 16, Rgb([200, 10, 10]))
            .save(dir.join("red.png"))
            .unwrap();
        RgbImage::from_pixel(16, 16, Rgb([10, 200, 10]))
            .save(dir.join("green.jpg"))
            .unwrap();
        fs::write(dir.join("broken.jpg"), b"not an image at all").unwrap();
    }
}

fn merged(report: &dataset_cleaner::core::ExecutionReport<WorkerReport>) -> WorkerReport {
    let mut total = WorkerReport::default();
    for chunk in report.successes() {
        total.merge(chunk.clone());
    }
    total
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn corrupt_images_are_quarantined_across_chunks() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("train");
    let classes = ["bird", "cat", "dog", "fish", "horse"];
    create_dataset(&data, &classes);
    let quarantine = temp.path().join("corrupt_img");

    let class_dirs = list_class_dirs(&data, &[quarantine.clone()]).unwrap();
    let scanner = CorruptionScanner::new(&quarantine, ProbeConfig::default());
    let report = ParallelExecutor::new(ExecutorConfig::new(3))
        .run(&scanner, &class_dirs)
        .unwrap();

    assert_eq!(report.len(), 3);
    assert!(!report.has_failures());

    let total = merged(&report);
    assert_eq!(total.classes, 5);
    assert_eq!(total.files_checked, 15);
    assert_eq!(total.relocated.len(), 5);
    assert!(total.failures.is_empty());

    for class in classes {
        assert_eq!(file_names(&data.join(class)), vec!["green.jpg", "red.png"]);
        assert_eq!(file_names(&quarantine.join(class)), vec!["broken.jpg"]);
    }
}

#[test]
fn quarantine_inside_root_is_not_a_class() {
    let temp = TempDir::new().unwrap();
    create_dataset(temp.path(), &["cat"]);
    let quarantine = temp.path().join("corrupt_img");
    fs::create_dir_all(quarantine.join("cat")).unwrap();

    let class_dirs = list_class_dirs(temp.path(), &[quarantine]).unwrap();

    assert_eq!(class_dirs, vec![temp.path().join("cat")]);
}

#[test]
fn missing_class_fails_only_its_chunk() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    create_dataset(&data, &["cat", "dog"]);
    let quarantine = temp.path().join("corrupt_img");

    let class_dirs = vec![
        data.join("cat"),
        data.join("vanished"),
        data.join("dog"),
    ];
    let scanner = CorruptionScanner::new(&quarantine, ProbeConfig::default());
    let report = ParallelExecutor::new(ExecutorConfig::new(3))
        .run(&scanner, &class_dirs)
        .unwrap();

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.chunk_index, 1);
    assert!(failure.to_string().contains("vanished"));
    assert_eq!(report.failed_items(&class_dirs), vec![&data.join("vanished")]);

    // The healthy chunks still did their work
    assert!(quarantine.join("cat").join("broken.jpg").exists());
    assert!(quarantine.join("dog").join("broken.jpg").exists());
}

#[test]
fn executor_events_cover_every_chunk() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    create_dataset(&data, &["a", "b", "c", "d"]);
    let class_dirs = list_class_dirs(&data, &[]).unwrap();

    let (sender, receiver) = EventChannel::new();
    let scanner = CorruptionScanner::new(temp.path().join("q"), ProbeConfig::default());
    let executor = ParallelExecutor::new(ExecutorConfig::new(2)).with_events(sender);
    executor.run(&scanner, &class_dirs).unwrap();
    drop(executor);

    let events: Vec<Event> = receiver.iter().collect();
    let completed = events
        .iter()
        .filter(|e| matches!(e, Event::Executor(ExecutorEvent::ChunkCompleted { .. })))
        .count();
    assert_eq!(completed, 2);
    assert!(matches!(
        events.last(),
        Some(Event::Executor(ExecutorEvent::Completed {
            succeeded: 2,
            failed: 0,
            ..
        }))
    ));
}

#[test]
fn non_rgb_images_are_separated() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    let cat = data.join("cat");
    fs::create_dir_all(&cat).unwrap();
    RgbImage::from_pixel(8, 8, Rgb([1, 2, 3]))
        .save(cat.join("color.png"))
        .unwrap();
    GrayImage::from_pixel(8, 8, Luma([128]))
        .save(cat.join("gray.png"))
        .unwrap();
    RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 4]))
        .save(cat.join("alpha.png"))
        .unwrap();
    let dest = temp.path().join("non_rgb");

    let class_dirs = list_class_dirs(&data, &[]).unwrap();
    let separator = RgbSeparator::new(&dest, ProbeConfig::default());
    let report = ParallelExecutor::new(ExecutorConfig::new(2))
        .run(&separator, &class_dirs)
        .unwrap();

    let total = merged(&report);
    assert_eq!(total.relocated.len(), 2);
    assert_eq!(file_names(&cat), vec!["color.png"]);
    assert_eq!(file_names(&dest.join("cat")), vec!["alpha.png", "gray.png"]);
}

#[test]
fn process_backend_runs_the_binary_as_worker() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    create_dataset(&data, &["cat", "dog", "owl"]);
    let quarantine = temp.path().join("corrupt_img");

    let class_dirs: Vec<PathBuf> = list_class_dirs(&data, &[]).unwrap();
    let backend = ProcessBackend::new(env!("CARGO_BIN_EXE_dataset-clean"));
    let config = ExecutorConfig::new(2).backend(BackendKind::Process(backend));
    let scanner = CorruptionScanner::new(&quarantine, ProbeConfig::default());

    let report = ParallelExecutor::new(config).run(&scanner, &class_dirs).unwrap();

    assert!(!report.has_failures(), "{:?}", report.failures().collect::<Vec<_>>());
    let total = merged(&report);
    assert_eq!(total.classes, 3);
    assert_eq!(total.relocated.len(), 3);
    for class in ["cat", "dog", "owl"] {
        assert!(quarantine.join(class).join("broken.jpg").exists());
        assert!(!data.join(class).join("broken.jpg").exists());
    }
}

#[test]
fn process_backend_isolates_a_failing_chunk() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    create_dataset(&data, &["cat"]);

    let class_dirs = vec![data.join("cat"), data.join("missing")];
    let backend = ProcessBackend::new(env!("CARGO_BIN_EXE_dataset-clean"));
    let config = ExecutorConfig::new(2).backend(BackendKind::Process(backend));
    let separator = RgbSeparator::new(temp.path().join("non_rgb"), ProbeConfig::default());

    let report = ParallelExecutor::new(config).run(&separator, &class_dirs).unwrap();

    assert!(report.outcomes[0].is_ok());
    assert!(report.outcomes[1].is_err());
}
