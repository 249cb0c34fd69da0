//! Connection handle: one upgraded stream, its mailbox, and the two loops.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::error::Closure;
use crate::heartbeat::HeartbeatPolicy;
use crate::inbound::InboundHandler;
use crate::mailbox::MailboxReceiver;
use crate::{read_loop, write_loop};

/// Unique identifier assigned to each pumped connection.
pub type ConnectionId = Uuid;

/// Authenticated identity of the peer. Used for attribution only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject(Arc<str>);

impl Subject {
    pub fn new(subject: impl Into<String>) -> Self {
        Self(Arc::from(subject.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Subject {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Subject {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// State shared by both loops of one connection.
#[derive(Debug, Clone)]
pub(crate) struct LoopContext {
    pub id: ConnectionId,
    pub subject: Subject,
    pub policy: HeartbeatPolicy,
    pub token: CancellationToken,
}

/// An upgraded stream waiting for its loops to be started.
pub struct Connection<S> {
    id: ConnectionId,
    subject: Subject,
    stream: WebSocketStream<S>,
    mailbox: MailboxReceiver,
    policy: HeartbeatPolicy,
    token: CancellationToken,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        stream: WebSocketStream<S>,
        subject: Subject,
        mailbox: MailboxReceiver,
        policy: HeartbeatPolicy,
        token: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject,
            stream,
            mailbox,
            policy,
            token,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Cancelling this token tears both loops down.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Splits the stream and spawns the read and write loops.
    ///
    /// Returns the read and write task handles, in that order.
    pub fn start(
        self,
        inbound: Arc<dyn InboundHandler>,
    ) -> (JoinHandle<Closure>, JoinHandle<Closure>) {
        let ctx = LoopContext {
            id: self.id,
            subject: self.subject,
            policy: self.policy,
            token: self.token,
        };
        let (sink, stream) = self.stream.split();

        let read_span = info_span!("ws_read", connection_id = %ctx.id, subject = %ctx.subject);
        let write_span = info_span!("ws_write", connection_id = %ctx.id, subject = %ctx.subject);

        let reader = tokio::spawn(read_loop::run(stream, ctx.clone(), inbound).instrument(read_span));
        let writer = tokio::spawn(write_loop::run(sink, self.mailbox, ctx).instrument(write_span));
        (reader, writer)
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("subject", &self.subject)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_displays_raw_identity() {
        let subject = Subject::new("aspirin2d");
        assert_eq!(subject.to_string(), "aspirin2d");
        assert_eq!(subject.as_str(), "aspirin2d");
        assert_eq!(subject, Subject::from("aspirin2d"));
    }
}
