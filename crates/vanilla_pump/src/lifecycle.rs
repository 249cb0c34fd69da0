//! Starting a pump for an upgraded stream and observing its teardown.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::connection::{Connection, ConnectionId, Subject};
use crate::error::{Closure, PolicyError, PumpError};
use crate::heartbeat::{HeartbeatPolicy, DEFAULT_MAILBOX_CAPACITY};
use crate::inbound::InboundHandler;
use crate::mailbox::{mailbox, EnqueueError, Outbox};

/// Per-connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpConfig {
    pub policy: HeartbeatPolicy,
    pub mailbox_capacity: usize,
}

impl PumpConfig {
    pub fn new(policy: HeartbeatPolicy, mailbox_capacity: usize) -> Result<Self, PolicyError> {
        policy.validate()?;
        if mailbox_capacity == 0 {
            return Err(PolicyError::ZeroMailboxCapacity);
        }
        Ok(Self {
            policy,
            mailbox_capacity,
        })
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            policy: HeartbeatPolicy::default(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

/// Wraps `stream` in a connection, starts both loops, and returns at once.
///
/// The connection token is a child of `parent`, so cancelling `parent`
/// tears this connection down along with every other one under it.
pub fn spawn_pump<S>(
    stream: WebSocketStream<S>,
    subject: Subject,
    config: PumpConfig,
    inbound: Arc<dyn InboundHandler>,
    parent: &CancellationToken,
) -> PumpHandle
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (outbox, receiver) = mailbox(config.mailbox_capacity);
    let connection = Connection::new(
        stream,
        subject,
        receiver,
        config.policy,
        parent.child_token(),
    );
    let id = connection.id();
    let subject = connection.subject().clone();
    let token = connection.token().clone();

    debug!(connection_id = %id, subject = %subject, "starting connection pump");
    let (reader, writer) = connection.start(inbound);

    PumpHandle {
        id,
        subject,
        outbox,
        token,
        reader,
        writer,
    }
}

/// Final closures of both loops.
#[derive(Debug)]
pub struct PumpOutcome {
    pub read: Closure,
    pub write: Closure,
}

impl PumpOutcome {
    pub fn is_clean(&self) -> bool {
        self.read.is_expected() && self.write.is_expected()
    }
}

/// Caller-side view of a running pump.
///
/// Dropping the handle never aborts the loops. The handle owns an [`Outbox`]
/// clone, though: once it and every other clone are gone, the mailbox is
/// closed, so the write loop flushes what is queued, sends a close frame and
/// the connection ends gracefully. Keep an [`Outbox`] clone to hold the
/// connection open without the handle.
#[derive(Debug)]
pub struct PumpHandle {
    id: ConnectionId,
    subject: Subject,
    outbox: Outbox,
    token: CancellationToken,
    reader: JoinHandle<Closure>,
    writer: JoinHandle<Closure>,
}

impl PumpHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Producer handle for this connection's mailbox.
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn enqueue(&self, msg: impl Into<Bytes>) -> Result<(), EnqueueError> {
        self.outbox.enqueue(msg)
    }

    /// Graceful stop: flushes what is queued, then sends a close frame.
    pub fn close(&self) {
        self.outbox.close();
    }

    /// Abrupt stop: both loops exit without draining the mailbox.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// True once either loop has begun tearing the connection down.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.reader.is_finished() && self.writer.is_finished()
    }

    /// Waits for both loops and returns how each one ended.
    pub async fn join(self) -> PumpOutcome {
        let (read, write) = tokio::join!(self.reader, self.writer);
        PumpOutcome {
            read: flatten(read, "read"),
            write: flatten(write, "write"),
        }
    }
}

fn flatten(joined: Result<Closure, tokio::task::JoinError>, which: &str) -> Closure {
    joined.unwrap_or_else(|err| {
        error!("❌ {} loop task failed: {}", which, err);
        Closure::Anomalous(PumpError::TaskFailed(err.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_config_uses_wire_constants() {
        let config = PumpConfig::default();
        assert_eq!(config.mailbox_capacity, 256);
        assert_eq!(config.policy, HeartbeatPolicy::default());
    }

    #[test]
    fn rejects_zero_capacity() {
        assert_eq!(
            PumpConfig::new(HeartbeatPolicy::default(), 0),
            Err(PolicyError::ZeroMailboxCapacity)
        );
        let policy =
            HeartbeatPolicy::new(Duration::from_millis(200), Duration::from_secs(1), 64).unwrap();
        assert!(PumpConfig::new(policy, 16).is_ok());
    }
}
