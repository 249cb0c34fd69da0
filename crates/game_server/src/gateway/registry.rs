use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;
use vanilla_pump::{ConnectionId, EnqueueError, Outbox, Subject};

#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
    #[error(transparent)]
    Enqueue(#[from] EnqueueError),
}

/// A live connection as seen by the rest of the server.
#[derive(Debug, Clone)]
pub struct Registration {
    pub subject: Subject,
    pub outbox: Outbox,
}

/// Live connections, keyed by connection id.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Registration>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: ConnectionId, subject: Subject, outbox: Outbox) {
        self.connections.insert(id, Registration { subject, outbox });
        debug!(connection_id = %id, total = self.connections.len(), "connection registered");
    }

    pub fn unregister(&self, id: ConnectionId) -> Option<Registration> {
        let removed = self.connections.remove(&id).map(|(_, registration)| registration);
        debug!(connection_id = %id, total = self.connections.len(), "connection unregistered");
        removed
    }

    /// Queues `msg` on one connection's mailbox without waiting.
    pub fn send(&self, id: ConnectionId, msg: impl Into<Bytes>) -> Result<(), SendError> {
        let registration = self
            .connections
            .get(&id)
            .ok_or(SendError::UnknownConnection(id))?;
        registration.outbox.enqueue(msg)?;
        Ok(())
    }

    /// Ids of every live connection authenticated as `subject`.
    pub fn connections_for(&self, subject: &Subject) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|entry| &entry.value().subject == subject)
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Closes every mailbox so each connection flushes and says goodbye.
    pub fn close_all(&self) {
        for entry in self.connections.iter() {
            entry.value().outbox.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use vanilla_pump::mailbox;

    #[tokio::test]
    async fn send_reaches_registered_mailbox() {
        let registry = ConnectionRegistry::new();
        let (outbox, mut rx) = mailbox(4);
        let id = Uuid::new_v4();
        registry.register(id, Subject::new("aspirin2d"), outbox);

        registry.send(id, "hello").unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");

        let missing = Uuid::new_v4();
        assert!(matches!(
            registry.send(missing, "x"),
            Err(SendError::UnknownConnection(found)) if found == missing
        ));
    }

    #[test]
    fn lookup_by_subject_and_close_all() {
        let registry = ConnectionRegistry::new();
        let subject = Subject::new("aspirin2d");
        let (first, _rx1) = mailbox(4);
        let (second, _rx2) = mailbox(4);
        let (other, _rx3) = mailbox(4);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.register(a, subject.clone(), first.clone());
        registry.register(b, subject.clone(), second.clone());
        registry.register(Uuid::new_v4(), Subject::new("someone"), other);

        let mut ids = registry.connections_for(&subject);
        ids.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(ids, expected);

        registry.close_all();
        assert!(first.is_closed());
        assert!(matches!(
            registry.send(b, "late"),
            Err(SendError::Enqueue(EnqueueError::Closed(_)))
        ));

        assert!(registry.unregister(a).is_some());
        assert!(registry.unregister(a).is_none());
        assert_eq!(registry.len(), 2);
    }
}
