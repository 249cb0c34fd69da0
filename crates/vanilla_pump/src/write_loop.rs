//! Outbound half of a connection: mailbox drain, coalescing and heartbeat.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, trace};

use crate::connection::LoopContext;
use crate::error::{Closure, ExpectedClosure, PumpError};
use crate::mailbox::MailboxReceiver;

type WsSink<S> = SplitSink<WebSocketStream<S>, Message>;

/// Drains the mailbox onto the wire and keeps the heartbeat going.
///
/// Ends when the mailbox is closed and empty, a write fails or overruns
/// `write_wait`, or the connection token is cancelled. On every exit path
/// the token is cancelled first, then the sink is closed.
pub(crate) async fn run<S>(mut sink: WsSink<S>, mut mailbox: MailboxReceiver, ctx: LoopContext) -> Closure
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let policy = ctx.policy;
    let write_wait = policy.write_wait();
    let mut ticker = interval_at(Instant::now() + policy.ping_period(), policy.ping_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let closure = loop {
        tokio::select! {
            _ = ctx.token.cancelled() => break Closure::Expected(ExpectedClosure::Shutdown),
            next = mailbox.recv() => {
                let Some(first) = next else {
                    let close = Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: Utf8Bytes::from_static(""),
                    }));
                    if let Err(err) = send_within(&mut sink, close, write_wait).await {
                        debug!("close frame not delivered: {}", err);
                    }
                    break Closure::Expected(ExpectedClosure::MailboxClosed);
                };

                let (payload, count) = coalesce(first, &mut mailbox);
                trace!(messages = count, bytes = payload.len(), "flushing mailbox");
                if let Err(err) = send_within(&mut sink, frame_for(payload), write_wait).await {
                    break Closure::from(err);
                }
            }
            _ = ticker.tick() => {
                if let Err(err) = send_within(&mut sink, Message::Ping(Bytes::new()), write_wait).await {
                    break Closure::from(err);
                }
            }
        }
    };

    drop(ticker);
    mailbox.close();
    // Release the read loop before waiting on a possibly stalled peer.
    ctx.token.cancel();
    if let Ok(Err(err)) = timeout(write_wait, sink.close()).await {
        trace!("stream close: {}", err);
    }

    match &closure {
        Closure::Expected(reason) => debug!("write loop stopped ({:?})", reason),
        Closure::Anomalous(err) => error!("❌ Write loop failed: {}", err),
    }
    closure
}

/// Joins `first` with every message already waiting, separated by `\n`.
fn coalesce(first: Bytes, mailbox: &mut MailboxReceiver) -> (Bytes, usize) {
    let rest = mailbox.drain_ready(usize::MAX);
    if rest.is_empty() {
        return (first, 1);
    }

    let len = first.len() + rest.iter().map(|msg| msg.len() + 1).sum::<usize>();
    let mut buf = BytesMut::with_capacity(len);
    buf.extend_from_slice(&first);
    for msg in &rest {
        buf.put_u8(b'\n');
        buf.extend_from_slice(msg);
    }
    (buf.freeze(), rest.len() + 1)
}

fn frame_for(payload: Bytes) -> Message {
    match Utf8Bytes::try_from(payload.clone()) {
        Ok(text) => Message::Text(text),
        Err(_) => Message::Binary(payload),
    }
}

async fn send_within<S>(sink: &mut WsSink<S>, message: Message, limit: Duration) -> Result<(), PumpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(limit, sink.send(message)).await {
        Ok(result) => result.map_err(PumpError::from),
        Err(_) => Err(PumpError::WriteTimeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::mailbox;

    #[test]
    fn coalesce_joins_with_single_newline() {
        let (outbox, mut rx) = mailbox(8);
        outbox.enqueue("b").unwrap();
        outbox.enqueue("c").unwrap();
        let (payload, count) = coalesce(Bytes::from_static(b"a"), &mut rx);
        assert_eq!(payload, "a\nb\nc");
        assert_eq!(count, 3);
    }

    #[test]
    fn coalesce_single_message_is_untouched() {
        let (_outbox, mut rx) = mailbox(8);
        let (payload, count) = coalesce(Bytes::from_static(b"solo"), &mut rx);
        assert_eq!(payload, "solo");
        assert_eq!(count, 1);
    }

    #[test]
    fn non_utf8_payloads_go_out_as_binary() {
        assert!(matches!(frame_for(Bytes::from_static(b"hi")), Message::Text(_)));
        assert!(matches!(
            frame_for(Bytes::from_static(&[0xff, 0xfe])),
            Message::Binary(_)
        ));
    }
}
