//! Bounded outbound mailbox.
//!
//! Many producers, one consumer (the write loop). Enqueueing never blocks:
//! a full mailbox rejects the message and hands it back to the producer,
//! so nothing that was accepted is ever dropped or reordered.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Why a message was not accepted. The message is returned to the caller.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("mailbox is full")]
    Full(Bytes),
    #[error("mailbox is closed")]
    Closed(Bytes),
}

impl EnqueueError {
    pub fn into_inner(self) -> Bytes {
        match self {
            EnqueueError::Full(msg) | EnqueueError::Closed(msg) => msg,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, EnqueueError::Full(_))
    }
}

/// Creates a mailbox holding at most `capacity` pending messages.
///
/// A capacity of zero is raised to one; [`crate::PumpConfig::new`] rejects
/// zero before it gets here.
pub fn mailbox(capacity: usize) -> (Outbox, MailboxReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let outbox = Outbox {
        inner: Arc::new(OutboxInner {
            sender: Mutex::new(Some(tx)),
            capacity,
        }),
    };
    (outbox, MailboxReceiver { rx })
}

/// Producer side of a connection mailbox. Cheap to clone.
#[derive(Clone)]
pub struct Outbox {
    inner: Arc<OutboxInner>,
}

struct OutboxInner {
    // `None` once closed; dropping the last sender is what the consumer sees.
    sender: Mutex<Option<mpsc::Sender<Bytes>>>,
    capacity: usize,
}

impl Outbox {
    /// Queues a message for delivery without waiting.
    pub fn enqueue(&self, msg: impl Into<Bytes>) -> Result<(), EnqueueError> {
        let msg = msg.into();
        let guard = self.inner.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return Err(EnqueueError::Closed(msg));
        };

        sender.try_send(msg).map_err(|err| match err {
            TrySendError::Full(msg) => EnqueueError::Full(msg),
            TrySendError::Closed(msg) => EnqueueError::Closed(msg),
        })
    }

    /// Stops accepting messages. Already queued messages stay deliverable.
    pub fn close(&self) {
        self.inner.sender.lock().take();
    }

    /// True after [`Outbox::close`] or once the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        self.inner
            .sender
            .lock()
            .as_ref()
            .map_or(true, |sender| sender.is_closed())
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of messages currently waiting.
    pub fn pending(&self) -> usize {
        self.inner
            .sender
            .lock()
            .as_ref()
            .map_or(0, |sender| sender.max_capacity() - sender.capacity())
    }
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("capacity", &self.inner.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Consumer side of a connection mailbox, owned by the write loop.
#[derive(Debug)]
pub struct MailboxReceiver {
    rx: mpsc::Receiver<Bytes>,
}

impl MailboxReceiver {
    /// Next message, or `None` once the mailbox is closed and empty.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Takes the messages that are queued right now, at most `limit`.
    pub fn drain_ready(&mut self, limit: usize) -> Vec<Bytes> {
        let ready = self.rx.len().min(limit);
        let mut drained = Vec::with_capacity(ready);
        while drained.len() < ready {
            match self.rx.try_recv() {
                Ok(msg) => drained.push(msg),
                Err(_) => break,
            }
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Refuses further messages; producers see [`EnqueueError::Closed`].
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_enqueue_order() {
        let (outbox, mut rx) = mailbox(8);
        for msg in ["one", "two", "three"] {
            outbox.enqueue(msg).unwrap();
        }
        assert_eq!(rx.recv().await.unwrap(), "one");
        assert_eq!(rx.recv().await.unwrap(), "two");
        assert_eq!(rx.recv().await.unwrap(), "three");
    }

    #[tokio::test]
    async fn full_mailbox_rejects_and_returns_message() {
        let (outbox, mut rx) = mailbox(2);
        outbox.enqueue("a").unwrap();
        outbox.enqueue("b").unwrap();
        assert_eq!(outbox.pending(), 2);

        let err = outbox.enqueue("c").unwrap_err();
        assert!(err.is_full());
        assert_eq!(err.into_inner(), "c");

        // Accepted messages are untouched by the rejection.
        assert_eq!(rx.recv().await.unwrap(), "a");
        outbox.enqueue("d").unwrap();
        assert_eq!(rx.recv().await.unwrap(), "b");
        assert_eq!(rx.recv().await.unwrap(), "d");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_keeps_queued_messages() {
        let (outbox, mut rx) = mailbox(4);
        outbox.enqueue("queued").unwrap();
        outbox.close();
        outbox.close();

        assert!(outbox.is_closed());
        assert!(matches!(
            outbox.enqueue("late"),
            Err(EnqueueError::Closed(_))
        ));
        assert_eq!(rx.recv().await.unwrap(), "queued");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn clones_share_close_state() {
        let (outbox, mut rx) = mailbox(4);
        let producer = outbox.clone();
        outbox.close();
        assert!(producer.enqueue("x").is_err());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn dropped_consumer_closes_mailbox() {
        let (outbox, rx) = mailbox(4);
        drop(rx);
        assert!(outbox.is_closed());
        assert!(matches!(outbox.enqueue("x"), Err(EnqueueError::Closed(_))));
    }

    #[test]
    fn drain_ready_respects_limit() {
        let (outbox, mut rx) = mailbox(8);
        for i in 0..5 {
            outbox.enqueue(format!("m{i}")).unwrap();
        }
        let first = rx.drain_ready(3);
        assert_eq!(first, vec!["m0", "m1", "m2"]);
        let rest = rx.drain_ready(usize::MAX);
        assert_eq!(rest, vec!["m3", "m4"]);
        assert!(rx.is_empty());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let (outbox, _rx) = mailbox(0);
        assert_eq!(outbox.capacity(), 1);
        outbox.enqueue("only").unwrap();
        assert!(outbox.enqueue("more").unwrap_err().is_full());
    }
}
