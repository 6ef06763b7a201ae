//! Scoped worker pool with channel fan-in.
//!
//! A fresh rayon pool is built per call and dropped before returning, so no
//! pool outlives the executor invocation that needed it.

use super::CancellationToken;
use crate::error::{ChunkError, ChunkErrorKind, ConfigError};
use crate::events::{Event, EventSender, ExecutorEvent};
use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

/// Run `task` once per chunk and return the outcomes in chunk order
pub(super) fn run_chunks<T, R, F>(
    items: &[T],
    ranges: &[Range<usize>],
    cancel: &CancellationToken,
    events: &EventSender,
    task: F,
) -> Result<Vec<Result<R, ChunkError>>, ConfigError>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &[T]) -> Result<R, ChunkErrorKind> + Sync,
{
    if ranges.is_empty() {
        return Ok(Vec::new());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(ranges.len())
        .thread_name(|i| format!("chunk-worker-{i}"))
        .build()
        .map_err(|e| ConfigError::PoolBuild(e.to_string()))?;

    let (sender, receiver) = crossbeam_channel::unbounded();
    let task = &task;

    pool.scope(|scope| {
        for (index, range) in ranges.iter().enumerate() {
            let sender = sender.clone();
            let chunk = &items[range.clone()];
            scope.spawn(move |_| {
                let outcome = run_one(index, chunk, cancel, events, task);
                let _ = sender.send((index, outcome));
            });
        }
    });
    drop(sender);

    // Tasks finish in any order; slot them back by index
    let mut slots: Vec<Option<Result<R, ChunkError>>> = (0..ranges.len()).map(|_| None).collect();
    for (index, outcome) in receiver.iter() {
        slots[index] = Some(outcome);
    }

    Ok(slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                Err(ChunkError::new(
                    index,
                    ChunkErrorKind::Failed("chunk produced no result".to_string()),
                ))
            })
        })
        .collect())
}

fn run_one<T, R, F>(
    index: usize,
    chunk: &[T],
    cancel: &CancellationToken,
    events: &EventSender,
    task: &F,
) -> Result<R, ChunkError>
where
    F: Fn(usize, &[T]) -> Result<R, ChunkErrorKind>,
{
    let outcome = if cancel.is_cancelled() {
        Err(ChunkErrorKind::Cancelled)
    } else {
        debug!(chunk = index, items = chunk.len(), "chunk started");
        events.send(Event::Executor(ExecutorEvent::ChunkStarted {
            chunk_index: index,
            items: chunk.len(),
        }));

        match panic::catch_unwind(AssertUnwindSafe(|| task(index, chunk))) {
            Ok(result) => result,
            Err(payload) => Err(ChunkErrorKind::Panicked(panic_message(payload.as_ref()))),
        }
    };

    match outcome {
        Ok(value) => {
            events.send(Event::Executor(ExecutorEvent::ChunkCompleted { chunk_index: index }));
            Ok(value)
        }
        Err(kind) => {
            events.send(Event::Executor(ExecutorEvent::ChunkFailed {
                chunk_index: index,
                message: kind.to_string(),
            }));
            Err(ChunkError::new(index, kind))
        }
    }
}

pub(super) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{null_sender, EventChannel};

    #[test]
    fn no_ranges_builds_no_pool() {
        let items: Vec<u8> = Vec::new();
        let outcomes = run_chunks(&items, &[], &CancellationToken::new(), &null_sender(), |_, _| {
            Ok::<_, ChunkErrorKind>(())
        })
        .unwrap();
        assert!(outcomes.is_empty());
    }

    #[test]
    fn events_report_each_chunk() {
        let (sender, receiver) = EventChannel::new();
        let items = [1u8, 2, 3];
        let ranges = vec![0..1, 1..2, 2..3];

        let outcomes = run_chunks(&items, &ranges, &CancellationToken::new(), &sender, |i, _| {
            if i == 1 {
                Err(ChunkErrorKind::Failed("nope".to_string()))
            } else {
                Ok(i)
            }
        })
        .unwrap();
        drop(sender);

        assert_eq!(outcomes.len(), 3);
        let events: Vec<Event> = receiver.iter().collect();
        let failed = events
            .iter()
            .filter(|e| matches!(e, Event::Executor(ExecutorEvent::ChunkFailed { chunk_index: 1, .. })))
            .count();
        let completed = events
            .iter()
            .filter(|e| matches!(e, Event::Executor(ExecutorEvent::ChunkCompleted { .. })))
            .count();
        assert_eq!(failed, 1);
        assert_eq!(completed, 2);
    }

    #[test]
    fn panic_message_reads_common_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(boxed.as_ref()), "static message");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(boxed.as_ref()), "owned message");
    }
}
