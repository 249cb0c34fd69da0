//! Error types and termination classification for the pump.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite::error::{CapacityError, ProtocolError};
use tokio_tungstenite::tungstenite::Error as WsError;

/// Rejected heartbeat or mailbox settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("pong wait must be greater than zero")]
    ZeroPongWait,
    #[error("ping period must be greater than zero")]
    ZeroPingPeriod,
    #[error("ping period {ping_period:?} must be shorter than pong wait {pong_wait:?}")]
    PingPeriodTooLong {
        ping_period: Duration,
        pong_wait: Duration,
    },
    #[error("write wait must be greater than zero")]
    ZeroWriteWait,
    #[error("max message size must be greater than zero")]
    ZeroMessageSize,
    #[error("mailbox capacity must be greater than zero")]
    ZeroMailboxCapacity,
}

/// Failure that ends one of the connection loops.
#[derive(Debug, Error)]
pub enum PumpError {
    /// No frame arrived from the peer before the read deadline.
    #[error("no frame from peer within {0:?}")]
    ReadTimeout(Duration),
    /// A single frame could not be written before the write deadline.
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),
    #[error("inbound message of {size} bytes exceeds limit of {max_size} bytes")]
    MessageTooLarge { size: usize, max_size: usize },
    #[error("peer closed with unexpected code {code}: {reason}")]
    UnexpectedClose { code: u16, reason: String },
    #[error("websocket transport error: {0}")]
    Transport(#[from] WsError),
    /// The loop task panicked or was aborted.
    #[error("connection task failed: {0}")]
    TaskFailed(String),
}

/// Non-exceptional reasons for a loop to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedClosure {
    /// Peer sent a normal or going-away close frame.
    PeerClosed,
    /// The transport ended or was reset underneath us.
    PeerGone,
    /// The mailbox was closed and fully drained.
    MailboxClosed,
    /// The connection token was cancelled, locally or by the other loop.
    Shutdown,
}

/// How a connection loop terminated.
#[derive(Debug)]
pub enum Closure {
    Expected(ExpectedClosure),
    Anomalous(PumpError),
}

impl Closure {
    pub fn is_expected(&self) -> bool {
        matches!(self, Closure::Expected(_))
    }

    pub fn is_anomalous(&self) -> bool {
        matches!(self, Closure::Anomalous(_))
    }

    /// The underlying error for anomalous closures.
    pub fn error(&self) -> Option<&PumpError> {
        match self {
            Closure::Anomalous(err) => Some(err),
            Closure::Expected(_) => None,
        }
    }
}

impl From<PumpError> for Closure {
    fn from(err: PumpError) -> Self {
        match err {
            PumpError::Transport(ws) => classify_transport(ws),
            other => Closure::Anomalous(other),
        }
    }
}

fn classify_transport(err: WsError) -> Closure {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            Closure::Expected(ExpectedClosure::PeerGone)
        }
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            Closure::Expected(ExpectedClosure::PeerGone)
        }
        WsError::Io(io_err) if is_disconnect(&io_err) => {
            Closure::Expected(ExpectedClosure::PeerGone)
        }
        WsError::Capacity(CapacityError::MessageTooLong { size, max_size }) => {
            Closure::Anomalous(PumpError::MessageTooLarge { size, max_size })
        }
        other => Closure::Anomalous(PumpError::Transport(other)),
    }
}

fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_frames_are_anomalous() {
        let err = WsError::Capacity(CapacityError::MessageTooLong {
            size: 1024,
            max_size: 512,
        });
        let closure = Closure::from(PumpError::from(err));
        assert!(matches!(
            closure,
            Closure::Anomalous(PumpError::MessageTooLarge {
                size: 1024,
                max_size: 512
            })
        ));
    }

    #[test]
    fn resets_count_as_peer_gone() {
        let reset = WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake);
        assert!(Closure::from(PumpError::from(reset)).is_expected());

        let pipe = WsError::Io(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(Closure::from(PumpError::from(pipe)).is_expected());

        let refused = WsError::Io(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(Closure::from(PumpError::from(refused)).is_anomalous());
    }

    #[test]
    fn timeouts_are_anomalous() {
        let closure = Closure::from(PumpError::ReadTimeout(Duration::from_millis(200)));
        assert!(closure.is_anomalous());
        assert!(matches!(closure.error(), Some(PumpError::ReadTimeout(_))));
    }
}
