//! # Events Module
//!
//! Channel-based progress reporting.
//!
//! ## Design
//! The core library emits events through channels so the CLI (or any other
//! front end) can render progress without the executor knowing about it.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! let consumer = receiver.spawn(|event| {
//!     if let Event::Executor(ExecutorEvent::ChunkFailed { chunk_index, message }) = event {
//!         eprintln!("chunk {chunk_index} failed: {message}");
//!     }
//! });
//!
//! let executor = ParallelExecutor::new(config).with_events(sender);
//! executor.run(&worker, &items)?;
//! drop(executor);
//! consumer.join().ok();
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
