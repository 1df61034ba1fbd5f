//! Write notifications.
//!
//! Successful creates, updates and deletes publish a [`RepositoryEvent`] to an
//! [`EventSink`]. Publishing is fire-and-forget: a sink never reports back and
//! can't fail the write that triggered it.

use derive_more::Display;
use quarry_query::Record;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

pub type SinkHandle = Arc<dyn EventSink>;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[display("created")]
    Created,
    #[display("updated")]
    Updated,
    #[display("deleted")]
    Deleted,
}

/// What happened, to which record, through which repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryEvent {
    pub action: Action,
    /// Identity of the repository that performed the write.
    pub repository: String,
    pub record: Record,
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: RepositoryEvent);
}

/// Logs every event at `info` level. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: RepositoryEvent) {
        tracing::info!(
            action = %event.action,
            repository = %event.repository,
            fields = event.record.len(),
            "repository entity {}",
            event.action,
        );
    }
}

/// Forwards events into an unbounded channel.
///
/// Events published after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<RepositoryEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RepositoryEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: RepositoryEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("event receiver dropped, discarding repository event");
        }
    }
}
