//! # CLI Module
//!
//! Command-line interface for the dataset cleaner.
//!
//! ## Usage
//! ```bash
//! # Quarantine corrupt images from two split directories
//! dataset-clean scan-corrupt data/train data/valid
//!
//! # Move non-RGB images aside using worker processes
//! dataset-clean separate-rgb data/train --backend process --workers 4
//!
//! # Split class folders into train/valid/test
//! dataset-clean split data --val 0.2 --test 0.1
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use dataset_cleaner::core::dataset::list_class_dirs;
use dataset_cleaner::core::executor::{default_worker_count, ExecutionReport, TaskRequest};
use dataset_cleaner::core::workers::dispatch_task;
use dataset_cleaner::core::{
    BackendKind, ChunkWorker, CorruptionScanner, DatasetSplitter, ExecutorConfig, ListingOrder,
    ParallelExecutor, ProbeConfig, ProcessBackend, RgbSeparator, ScanOptions, SplitConfig,
    SplitReport, WorkerReport,
};
use dataset_cleaner::error::{CleanerError, ConfigError, Result};
use dataset_cleaner::events::{
    Event, EventChannel, EventReceiver, EventSender, ExecutorEvent, RelocationEvent, SplitEvent,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

/// Dataset Cleaner - quarantine, separate and split image datasets
#[derive(Parser, Debug)]
#[command(name = "dataset-clean")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Move corrupt or unreadable images into a quarantine tree
    ScanCorrupt {
        #[command(flatten)]
        sweep: SweepArgs,

        /// Quarantine directory (default: corrupt_img next to the first root)
        #[arg(short, long)]
        quarantine: Option<PathBuf>,

        /// Treat truncated images as corrupt
        #[arg(long)]
        strict: bool,

        /// Do not validate embedded EXIF metadata
        #[arg(long)]
        skip_metadata: bool,
    },

    /// Move non-RGB images into a separation tree
    SeparateRgb {
        #[command(flatten)]
        sweep: SweepArgs,

        /// Separation directory (default: non_rgb next to the first root)
        #[arg(short, long)]
        dest: Option<PathBuf>,
    },

    /// Split class folders into train/valid/test
    Split {
        /// Dataset root containing one folder per class
        root: PathBuf,

        /// Fraction of each class moved to valid/
        #[arg(long = "val", default_value = "0.2")]
        val_ratio: f64,

        /// Fraction of each class moved to test/
        #[arg(long = "test", default_value = "0.1")]
        test_ratio: f64,

        /// Assign files in name order instead of directory order
        #[arg(long)]
        sort_by_name: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Run one chunk for a parent process (reads a request on stdin)
    #[command(hide = true)]
    WorkerTask,
}

/// Options shared by the parallel sweeps
#[derive(Args, Debug)]
struct SweepArgs {
    /// Directories whose subfolders are dataset classes
    #[arg(required = true)]
    roots: Vec<PathBuf>,

    /// Number of workers (default: number of CPUs)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Worker pool backend
    #[arg(short, long, default_value = "thread")]
    backend: Backend,

    /// Also check files in nested folders inside each class
    #[arg(long)]
    recursive: bool,

    /// Ignore dot-files
    #[arg(long)]
    skip_hidden: bool,

    /// Output format
    #[arg(short, long, default_value = "pretty")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// Threads - best for I/O-bound scans (default)
    Thread,
    /// Child processes - true CPU parallelism for heavy decoding
    Process,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    dataset_cleaner::init_tracing();

    let result = match cli.command {
        Commands::ScanCorrupt {
            sweep,
            quarantine,
            strict,
            skip_metadata,
        } => {
            let probe = ProbeConfig {
                tolerate_truncated: !strict,
                check_metadata: !skip_metadata,
            };
            let quarantine = destination(&sweep.roots, quarantine, "corrupt_img");
            let options = sweep.scan_options();
            run_sweep(&sweep, quarantine.clone(), "Corrupt image scan", |events| {
                CorruptionScanner::new(quarantine.clone(), probe)
                    .with_options(options)
                    .with_events(events)
            })
        }
        Commands::SeparateRgb { sweep, dest } => {
            let dest = destination(&sweep.roots, dest, "non_rgb");
            let options = sweep.scan_options();
            run_sweep(&sweep, dest.clone(), "Non-RGB separation", |events| {
                RgbSeparator::new(dest.clone(), ProbeConfig::default())
                    .with_options(options)
                    .with_events(events)
            })
        }
        Commands::Split {
            root,
            val_ratio,
            test_ratio,
            sort_by_name,
            output,
        } => {
            let order = if sort_by_name {
                ListingOrder::Name
            } else {
                ListingOrder::Directory
            };
            run_split(&root, SplitConfig::new(val_ratio, test_ratio).order(order), output)
        }
        Commands::WorkerTask => run_worker_task(),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            Term::stderr()
                .write_line(&format!("{} {}", style("error:").red().bold(), e))
                .ok();
            ExitCode::FAILURE
        }
    }
}

impl SweepArgs {
    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            recursive: self.recursive,
            include_hidden: !self.skip_hidden,
        }
    }

    fn executor_config(&self) -> Result<ExecutorConfig> {
        let backend = match self.backend {
            Backend::Thread => BackendKind::Thread,
            Backend::Process => BackendKind::Process(ProcessBackend::current_exe().map_err(|e| {
                ConfigError::PoolBuild(format!("cannot locate worker executable: {}", e))
            })?),
        };
        Ok(ExecutorConfig::new(self.workers.unwrap_or_else(default_worker_count)).backend(backend))
    }
}

/// Explicit destination, or `name` next to the first root
fn destination(roots: &[PathBuf], explicit: Option<PathBuf>, name: &str) -> PathBuf {
    explicit.unwrap_or_else(|| {
        roots
            .first()
            .and_then(|root| root.parent())
            .unwrap_or_else(|| Path::new("."))
            .join(name)
    })
}

fn run_sweep<W, F>(args: &SweepArgs, destination: PathBuf, title: &str, build: F) -> Result<ExitCode>
where
    W: ChunkWorker<Item = PathBuf, Output = WorkerReport>,
    F: FnOnce(EventSender) -> W,
{
    let term = Term::stderr();
    let pretty = matches!(args.output, OutputFormat::Pretty);

    // Configuration errors surface before any file moves
    let mut class_dirs = Vec::new();
    for root in &args.roots {
        class_dirs.extend(list_class_dirs(root, &[destination.clone()])?);
    }
    let config = args.executor_config()?;

    if pretty {
        term.write_line(&format!(
            "{} {} class folders, {} {} workers",
            style(title).bold().cyan(),
            style(class_dirs.len()).cyan(),
            config.worker_count,
            config.backend.name()
        ))
        .ok();
    }

    let (sender, receiver) = EventChannel::new();
    let worker = build(sender.clone());
    let executor = ParallelExecutor::new(config).with_events(sender.clone());
    drop(sender);

    let progress = pretty.then(progress_bar);
    let event_thread = spawn_sweep_progress(receiver, progress.clone());

    let report = executor.run(&worker, &class_dirs)?;

    // The worker holds the last sender; dropping it ends the event thread
    drop(worker);
    drop(executor);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let mut total = WorkerReport::default();
    for chunk in report.successes() {
        total.merge(chunk.clone());
    }

    match args.output {
        OutputFormat::Pretty => print_sweep_pretty(&term, &destination, &report, &total, &class_dirs),
        OutputFormat::Json => print_sweep_json(&destination, &report, &total, &class_dirs),
    }

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(bar_style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} chunks {msg}")
    {
        pb.set_style(bar_style.progress_chars("█▓░"));
    }
    pb
}

fn spawn_sweep_progress(receiver: EventReceiver, progress: Option<ProgressBar>) -> thread::JoinHandle<()> {
    let mut moved = 0usize;
    receiver.spawn(move |event| {
        let Some(pb) = progress.as_ref() else {
            return;
        };
        match event {
            Event::Executor(ExecutorEvent::Started { chunks, .. }) => pb.set_length(chunks as u64),
            Event::Executor(ExecutorEvent::ChunkCompleted { .. })
            | Event::Executor(ExecutorEvent::ChunkFailed { .. }) => pb.inc(1),
            Event::Relocation(RelocationEvent::Relocated { source, .. }) => {
                moved += 1;
                pb.set_message(format!(
                    "{} moved (last: {})",
                    moved,
                    source.file_name().unwrap_or_default().to_string_lossy()
                ));
            }
            _ => {}
        }
    })
}

fn print_sweep_pretty(
    term: &Term,
    destination: &Path,
    report: &ExecutionReport<WorkerReport>,
    total: &WorkerReport,
    class_dirs: &[PathBuf],
) {
    term.write_line("").ok();
    let (mark, heading) = if report.has_failures() {
        (style("✗").red().bold(), "Finished with failed chunks")
    } else {
        (style("✓").green().bold(), "Complete")
    };
    term.write_line(&format!("{} {}", mark, heading)).ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} files checked in {} classes ({:.1}s)",
        style(total.files_checked).cyan(),
        style(total.classes).cyan(),
        report.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} files moved to {}",
        style(total.relocated.len()).yellow(),
        destination.display()
    ))
    .ok();

    if !total.failures.is_empty() {
        term.write_line(&format!(
            "  {} files could not be processed:",
            style(total.failures.len()).red()
        ))
        .ok();
        for failure in &total.failures {
            term.write_line(&format!("    {} {}", style("○").dim(), failure.message))
                .ok();
        }
    }

    if report.has_failures() {
        term.write_line("").ok();
        term.write_line(&format!("{}", style("Failed chunks:").bold().underlined()))
            .ok();
        for failure in report.failures() {
            term.write_line(&format!("  {} {}", style("✗").red(), failure)).ok();
        }
        term.write_line(&format!(
            "{}",
            style("Re-run against these class folders to finish:").dim()
        ))
        .ok();
        for dir in report.failed_items(class_dirs) {
            term.write_line(&format!("    {}", dir.display())).ok();
        }
    }
}

fn print_sweep_json(
    destination: &Path,
    report: &ExecutionReport<WorkerReport>,
    total: &WorkerReport,
    class_dirs: &[PathBuf],
) {
    let failed_chunks: Vec<serde_json::Value> = report
        .failures()
        .map(|f| {
            serde_json::json!({
                "chunk_index": f.chunk_index,
                "error": f.kind.to_string(),
            })
        })
        .collect();

    let output = serde_json::json!({
        "destination": destination,
        "finished_at": chrono::Utc::now().to_rfc3339(),
        "duration_ms": report.duration_ms,
        "chunks": report.len(),
        "failed_chunks": failed_chunks,
        "unprocessed_classes": report.failed_items(class_dirs),
        "classes": total.classes,
        "files_checked": total.files_checked,
        "relocated": total.relocated,
        "failures": total.failures,
    });

    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("failed to encode report: {}", e),
    }
}

fn run_split(root: &Path, config: SplitConfig, output: OutputFormat) -> Result<ExitCode> {
    let term = Term::stderr();
    let pretty = matches!(output, OutputFormat::Pretty);

    let (sender, receiver) = EventChannel::new();
    let spinner = pretty.then(ProgressBar::new_spinner);
    let spinner_clone = spinner.clone();
    let event_thread = receiver.spawn(move |event| {
        if let (Some(pb), Event::Split(SplitEvent::ClassStarted { class, files })) =
            (spinner_clone.as_ref(), event)
        {
            pb.set_message(format!("{} ({} files)", class, files));
            pb.tick();
        }
    });

    let splitter = DatasetSplitter::new(config).with_events(sender);
    let result = splitter.split(root);
    drop(splitter);
    event_thread.join().ok();
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let report = result?;
    match output {
        OutputFormat::Pretty => print_split_pretty(&term, root, &report),
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!("failed to encode report: {}", e),
        },
    }
    Ok(ExitCode::SUCCESS)
}

fn print_split_pretty(term: &Term, root: &Path, report: &SplitReport) {
    term.write_line(&format!(
        "{} Split {} files from {} classes under {}",
        style("✓").green().bold(),
        style(report.total_files()).cyan(),
        style(report.classes.len()).cyan(),
        root.display()
    ))
    .ok();

    for class in &report.classes {
        term.write_line(&format!(
            "  {:<24} valid {:>6}  test {:>6}  train {:>6}{}",
            class.class,
            class.counts.valid,
            class.counts.test,
            class.counts.train,
            if class.removed { "" } else { "  (folder kept: not empty)" }
        ))
        .ok();
    }

    if !report.skipped.is_empty() {
        term.write_line(&format!(
            "  {} {}",
            style("Left existing split folders alone:").dim(),
            report.skipped.join(", ")
        ))
        .ok();
    }
}

/// Child side of the process backend
fn run_worker_task() -> Result<ExitCode> {
    let mut input = Vec::new();
    std::io::stdin()
        .read_to_end(&mut input)
        .map_err(|e| CleanerError::Task(format!("failed to read request: {}", e)))?;
    let request: TaskRequest = serde_json::from_slice(&input)
        .map_err(|e| CleanerError::Task(format!("malformed request: {}", e)))?;

    let response = dispatch_task(request);

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, &response)
        .map_err(|e| CleanerError::Task(format!("failed to write response: {}", e)))?;
    stdout
        .flush()
        .map_err(|e| CleanerError::Task(format!("failed to write response: {}", e)))?;
    Ok(ExitCode::SUCCESS)
}
