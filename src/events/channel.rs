//! Progress event plumbing over crossbeam-channel.
//!
//! Pool threads, chunk workers and the splitter report through clones of one
//! [`EventSender`]; the CLI consumes the [`EventReceiver`] on its own thread.
//! The stream ends once every sender clone has been dropped.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};

use super::Event;

/// Reporting handle given to the executor, workers and splitter.
///
/// A sender without a channel (see [`null_sender`]) drops every event.
#[derive(Clone, Default)]
pub struct EventSender {
    inner: Option<Sender<Event>>,
}

impl EventSender {
    /// Never blocks; events sent after the receiver is gone are discarded
    pub fn send(&self, event: Event) {
        if let Some(sender) = &self.inner {
            let _ = sender.send(event);
        }
    }
}

/// Consuming end of an event channel
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Events in arrival order, until every sender is dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }

    /// Feed every event to `handle` on a background thread.
    ///
    /// Join the returned handle after dropping the senders to be sure the
    /// last events were seen.
    pub fn spawn<F>(self, mut handle: F) -> JoinHandle<()>
    where
        F: FnMut(Event) + Send + 'static,
    {
        thread::spawn(move || {
            for event in self.inner.iter() {
                handle(event);
            }
        })
    }
}

/// Constructor for sender/receiver pairs
pub struct EventChannel;

impl EventChannel {
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender {
                inner: Some(sender),
            },
            EventReceiver { inner: receiver },
        )
    }
}

/// Sender for callers that do not want progress events
pub fn null_sender() -> EventSender {
    EventSender::default()
}
