//! Inbound half of a connection: read deadline, frame dispatch and closure
//! classification.

use std::sync::Arc;

use futures::stream::SplitStream;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{timeout_at, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, trace};

use crate::connection::LoopContext;
use crate::error::{Closure, ExpectedClosure, PumpError};
use crate::inbound::{normalize, InboundHandler};

/// Consumes inbound frames until the peer goes away, misbehaves, or the
/// connection token is cancelled. Always cancels the token on the way out.
pub(crate) async fn run<S>(
    mut stream: SplitStream<WebSocketStream<S>>,
    ctx: LoopContext,
    inbound: Arc<dyn InboundHandler>,
) -> Closure
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let policy = ctx.policy;
    let mut deadline = policy.read_deadline(Instant::now());

    let closure = loop {
        let next = tokio::select! {
            _ = ctx.token.cancelled() => break Closure::Expected(ExpectedClosure::Shutdown),
            next = timeout_at(deadline, stream.next()) => next,
        };

        let message = match next {
            Err(_) => break Closure::Anomalous(PumpError::ReadTimeout(policy.pong_wait())),
            Ok(None) => break Closure::Expected(ExpectedClosure::PeerGone),
            Ok(Some(Err(err))) => break Closure::from(PumpError::from(err)),
            Ok(Some(Ok(message))) => message,
        };

        deadline = policy.read_deadline(Instant::now());

        match message {
            Message::Text(text) => inbound.on_message(&ctx.subject, &normalize(text.as_str())),
            Message::Binary(data) => {
                inbound.on_message(&ctx.subject, &normalize(&String::from_utf8_lossy(&data)))
            }
            Message::Pong(_) => trace!("pong"),
            Message::Ping(_) => trace!("ping"),
            Message::Close(frame) => break classify_close(frame),
            Message::Frame(_) => {}
        }
    };

    report(&closure);
    ctx.token.cancel();
    closure
}

fn classify_close(frame: Option<CloseFrame>) -> Closure {
    let Some(frame) = frame else {
        return Closure::Expected(ExpectedClosure::PeerClosed);
    };
    match frame.code {
        CloseCode::Normal | CloseCode::Away => Closure::Expected(ExpectedClosure::PeerClosed),
        code => Closure::Anomalous(PumpError::UnexpectedClose {
            code: u16::from(code),
            reason: frame.reason.as_str().to_string(),
        }),
    }
}

fn report(closure: &Closure) {
    match closure {
        Closure::Expected(ExpectedClosure::Shutdown) => debug!("read loop stopped"),
        Closure::Expected(reason) => info!("🔌 Peer disconnected ({:?})", reason),
        Closure::Anomalous(err) => error!("❌ Read loop failed: {}", err),
    }
}

