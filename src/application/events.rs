//! Event emission from the batch worker to whoever drives it
//!
//! Events travel over an unbounded channel so the worker never waits on the
//! driving side. A closed receiver is not an error for the worker.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;

use crate::domain::events::BatchEvent;

/// Event emitter handed to the batch worker
#[derive(Clone, Debug)]
pub struct EventEmitter {
    sender: Option<UnboundedSender<BatchEvent>>,
}

impl EventEmitter {
    /// Create an emitter together with the receiving end
    pub fn channel() -> (Self, UnboundedReceiver<BatchEvent>) {
        let (sender, receiver) = unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Emitter that drops every event
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, event: BatchEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(event).is_err() {
            debug!("Event receiver dropped, event discarded");
        }
    }

    pub fn progress(&self, current: usize, total: usize) {
        self.emit(BatchEvent::progress(current, total));
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(BatchEvent::status(message));
    }
}
