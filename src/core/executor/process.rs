//! Process-backed chunk execution.
//!
//! Each chunk runs in a child process. The parent writes one JSON
//! [`TaskRequest`] to the child's stdin, the child answers with one JSON
//! [`TaskResponse`] on stdout. Logs go to the child's stderr, which is
//! inherited from the parent.

use super::{ChunkWorker, CancellationToken};
use crate::error::ChunkErrorKind;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Subcommand the default worker program understands
pub const WORKER_SUBCOMMAND: &str = "worker-task";

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// One chunk of work sent to a child process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Registered worker name ([`ChunkWorker::NAME`])
    pub worker: String,
    pub chunk_index: usize,
    /// The serialized worker (shared context)
    pub config: serde_json::Value,
    /// The serialized chunk items
    pub items: serde_json::Value,
}

/// How a child finished its chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Ok(serde_json::Value),
    Failed(String),
    Panicked(String),
    Cancelled,
}

/// A child's answer for one chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub chunk_index: usize,
    pub outcome: TaskOutcome,
}

impl TaskResponse {
    pub fn failed(chunk_index: usize, message: impl Into<String>) -> Self {
        Self {
            chunk_index,
            outcome: TaskOutcome::Failed(message.into()),
        }
    }
}

/// Spawns one child per chunk
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessBackend {
    /// Use `program` as the worker executable, invoked as `program worker-task`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![WORKER_SUBCOMMAND.to_string()],
        }
    }

    /// Re-invoke the running executable as the worker
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Replace the arguments passed before the request is written
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Run one chunk in a child process and decode its output
    pub(super) fn run_chunk<W: ChunkWorker>(
        &self,
        worker: &W,
        chunk_index: usize,
        chunk: &[W::Item],
        cancel: &CancellationToken,
    ) -> Result<W::Output, ChunkErrorKind> {
        let request = TaskRequest {
            worker: W::NAME.to_string(),
            chunk_index,
            config: serde_json::to_value(worker).map_err(protocol_error)?,
            items: serde_json::to_value(chunk).map_err(protocol_error)?,
        };
        let payload = serde_json::to_vec(&request).map_err(protocol_error)?;

        let stdout = self.exchange(&payload, chunk_index, cancel)?;

        let response: TaskResponse = serde_json::from_slice(&stdout).map_err(|e| {
            ChunkErrorKind::Process(format!("malformed response from worker process: {e}"))
        })?;
        if response.chunk_index != chunk_index {
            return Err(ChunkErrorKind::Process(format!(
                "worker answered for chunk {} instead of {}",
                response.chunk_index, chunk_index
            )));
        }

        match response.outcome {
            TaskOutcome::Ok(value) => serde_json::from_value(value).map_err(protocol_error),
            TaskOutcome::Failed(message) => Err(ChunkErrorKind::Failed(message)),
            TaskOutcome::Panicked(message) => Err(ChunkErrorKind::Panicked(message)),
            TaskOutcome::Cancelled => Err(ChunkErrorKind::Cancelled),
        }
    }

    /// Write the request, wait for exit (or cancellation), return stdout
    fn exchange(
        &self,
        payload: &[u8],
        chunk_index: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ChunkErrorKind> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                ChunkErrorKind::Process(format!(
                    "failed to spawn {}: {}",
                    self.program.display(),
                    e
                ))
            })?;
        debug!(chunk = chunk_index, pid = child.id(), "worker process spawned");

        // The child reads all of stdin before writing anything to stdout
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(payload) {
                kill(&mut child);
                return Err(ChunkErrorKind::Process(format!(
                    "failed to send request to worker process: {e}"
                )));
            }
        }

        let mut stdout = child.stdout.take().ok_or_else(|| {
            ChunkErrorKind::Process("worker process has no stdout".to_string())
        })?;
        let reader = thread::spawn(move || {
            let mut buffer = Vec::new();
            stdout.read_to_end(&mut buffer).map(|_| buffer)
        });

        let status = loop {
            if cancel.is_cancelled() {
                warn!(chunk = chunk_index, "cancelling worker process");
                kill(&mut child);
                let _ = reader.join();
                return Err(ChunkErrorKind::Cancelled);
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    kill(&mut child);
                    return Err(ChunkErrorKind::Process(format!(
                        "failed to wait for worker process: {e}"
                    )));
                }
            }
        };

        let output = match reader.join() {
            Ok(Ok(buffer)) => buffer,
            Ok(Err(e)) => {
                return Err(ChunkErrorKind::Process(format!(
                    "failed to read worker output: {e}"
                )))
            }
            Err(_) => {
                return Err(ChunkErrorKind::Process(
                    "worker output reader panicked".to_string(),
                ))
            }
        };

        if !status.success() {
            return Err(ChunkErrorKind::Process(format!(
                "worker process exited with {status}"
            )));
        }

        Ok(output)
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn protocol_error(error: serde_json::Error) -> ChunkErrorKind {
    ChunkErrorKind::Process(format!("task serialization failed: {error}"))
}

/// Child side: run `request` with worker type `W`.
///
/// Never panics and never returns `Err`; every failure is encoded in the
/// response so the parent can attribute it to the right chunk.
pub fn serve_task<W: ChunkWorker>(request: TaskRequest) -> TaskResponse {
    let chunk_index = request.chunk_index;

    let worker: W = match serde_json::from_value(request.config) {
        Ok(worker) => worker,
        Err(e) => return TaskResponse::failed(chunk_index, format!("invalid worker config: {e}")),
    };
    let items: Vec<W::Item> = match serde_json::from_value(request.items) {
        Ok(items) => items,
        Err(e) => return TaskResponse::failed(chunk_index, format!("invalid chunk items: {e}")),
    };

    let cancel = CancellationToken::new();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        worker.process_chunk(chunk_index, &items, &cancel)
    }));

    let outcome = match result {
        Ok(Ok(output)) => match serde_json::to_value(output) {
            Ok(value) => TaskOutcome::Ok(value),
            Err(e) => TaskOutcome::Failed(format!("failed to encode output: {e}")),
        },
        Ok(Err(e)) if W::is_cancellation(&e) => TaskOutcome::Cancelled,
        Ok(Err(e)) => TaskOutcome::Failed(e.to_string()),
        Err(payload) => TaskOutcome::Panicked(super::pool::panic_message(payload.as_ref())),
    };

    TaskResponse {
        chunk_index,
        outcome,
    }
}
