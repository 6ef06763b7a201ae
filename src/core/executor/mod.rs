//! # Executor Module
//!
//! Chunked parallel task executor shared by every cleanup operation.
//!
//! ## Contract
//! 1. **Split** - items are cut into balanced chunks by [`crate::core::splitter`]
//! 2. **Dispatch** - one task per chunk on a pool bounded by the worker count;
//!    the pool lives only for the duration of [`ParallelExecutor::run`]
//! 3. **Isolate** - an error, panic or crashed child in chunk *i* becomes the
//!    result of chunk *i* and nothing else
//! 4. **Gather** - results are returned indexed by chunk position, whatever
//!    order the tasks finished in
//!
//! ## Backends
//! - [`BackendKind::Thread`] runs chunks on a scoped rayon pool (I/O-bound scans)
//! - [`BackendKind::Process`] runs each chunk in a child process speaking a
//!   JSON protocol over stdin/stdout (CPU-bound decoding)
//!
//! Both satisfy the same contract, so callers switch backends without
//! touching the worker.

mod cancel;
mod pool;
pub mod process;

pub use cancel::CancellationToken;
pub use process::{serve_task, ProcessBackend, TaskOutcome, TaskRequest, TaskResponse};

use crate::core::splitter;
use crate::error::{ChunkError, ChunkErrorKind, ConfigError};
use crate::events::{null_sender, Event, EventSender, ExecutorEvent};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ops::Range;
use std::time::Instant;
use tracing::{error, info};

/// A pure function over one chunk of work items.
///
/// The worker value itself is the shared context: it is borrowed by every
/// pool thread, and serialized into each child for the process backend.
pub trait ChunkWorker: Send + Sync + Serialize + DeserializeOwned {
    /// One unit of work (a class directory, a file, ...)
    type Item: Send + Sync + Serialize + DeserializeOwned;
    /// Per-chunk result
    type Output: Send + Serialize + DeserializeOwned;
    /// Per-chunk failure
    type Error: std::error::Error;

    /// Name used to find this worker inside a child process
    const NAME: &'static str;

    /// Process one chunk, checking `cancel` between items
    fn process_chunk(
        &self,
        chunk_index: usize,
        chunk: &[Self::Item],
        cancel: &CancellationToken,
    ) -> Result<Self::Output, Self::Error>;

    /// Whether `error` reports a cooperative stop rather than a failure
    fn is_cancellation(_error: &Self::Error) -> bool {
        false
    }
}

/// Which kind of pool runs the chunks
#[derive(Debug, Clone, Default)]
pub enum BackendKind {
    /// OS threads in a scoped rayon pool
    #[default]
    Thread,
    /// One child process per chunk
    Process(ProcessBackend),
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Thread => "thread",
            BackendKind::Process(_) => "process",
        }
    }
}

/// Configuration for the parallel executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound on concurrently running chunks (and number of chunks).
    /// Zero runs the whole input as a single chunk.
    pub worker_count: usize,
    /// Pool backend
    pub backend: BackendKind,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            backend: BackendKind::Thread,
        }
    }
}

impl ExecutorConfig {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Default::default()
        }
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }
}

/// Number of CPUs, falling back to one
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Outcome of one executor invocation
#[derive(Debug)]
pub struct ExecutionReport<R> {
    /// One entry per chunk, in submission order
    pub outcomes: Vec<Result<R, ChunkError>>,
    /// Item range covered by each chunk
    pub chunk_ranges: Vec<Range<usize>>,
    /// Wall-clock duration of the run
    pub duration_ms: u64,
}

impl<R> ExecutionReport<R> {
    /// Number of chunks
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Successful chunk results, in chunk order
    pub fn successes(&self) -> impl Iterator<Item = &R> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    /// Captured chunk failures, in chunk order
    pub fn failures(&self) -> impl Iterator<Item = &ChunkError> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    pub fn succeeded(&self) -> usize {
        self.successes().count()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    /// True when at least one chunk did not complete
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| o.is_err())
    }

    /// Items belonging to failed chunks, for a re-run over what is left
    pub fn failed_items<'a, T>(&self, items: &'a [T]) -> Vec<&'a T> {
        self.failures()
            .filter_map(|e| self.chunk_ranges.get(e.chunk_index))
            .flat_map(|range| items[range.clone()].iter())
            .collect()
    }
}

/// Splits, dispatches and gathers chunk tasks
pub struct ParallelExecutor {
    config: ExecutorConfig,
    cancel: CancellationToken,
    events: EventSender,
}

impl ParallelExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
            events: null_sender(),
        }
    }

    /// Share a cancellation token with the caller
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report progress through an event channel
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run `worker` over `items` and block until every chunk has finished.
    ///
    /// Only configuration problems are returned as `Err`; everything that
    /// goes wrong inside a chunk is captured in the report.
    pub fn run<W: ChunkWorker>(
        &self,
        worker: &W,
        items: &[W::Item],
    ) -> Result<ExecutionReport<W::Output>, ConfigError> {
        let start = Instant::now();
        let ranges = splitter::chunk_ranges(items.len(), self.config.worker_count);

        info!(
            worker = W::NAME,
            backend = self.config.backend.name(),
            chunks = ranges.len(),
            items = items.len(),
            "dispatching chunks"
        );
        self.events.send(Event::Executor(ExecutorEvent::Started {
            chunks: ranges.len(),
            items: items.len(),
            backend: self.config.backend.name().to_string(),
        }));

        let outcomes = match &self.config.backend {
            BackendKind::Thread => {
                pool::run_chunks(items, &ranges, &self.cancel, &self.events, |index, chunk| {
                    worker
                        .process_chunk(index, chunk, &self.cancel)
                        .map_err(|e| {
                            if W::is_cancellation(&e) {
                                ChunkErrorKind::Cancelled
                            } else {
                                ChunkErrorKind::Failed(e.to_string())
                            }
                        })
                })?
            }
            BackendKind::Process(backend) => {
                pool::run_chunks(items, &ranges, &self.cancel, &self.events, |index, chunk| {
                    backend.run_chunk(worker, index, chunk, &self.cancel)
                })?
            }
        };

        let report = ExecutionReport {
            outcomes,
            chunk_ranges: ranges,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        for failure in report.failures() {
            error!(worker = W::NAME, chunk = failure.chunk_index, "{}", failure.kind);
        }
        info!(
            worker = W::NAME,
            succeeded = report.succeeded(),
            failed = report.failed(),
            duration_ms = report.duration_ms,
            "all chunks finished"
        );
        self.events.send(Event::Executor(ExecutorEvent::Completed {
            succeeded: report.succeeded(),
            failed: report.failed(),
            duration_ms: report.duration_ms,
        }));

        Ok(report)
    }
}
