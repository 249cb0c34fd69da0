//! # Vanilla Pump - Persistent Duplex Connection Pump
//!
//! Owns one upgraded WebSocket stream per authenticated client and keeps it
//! alive, ordered and bounded for as long as the peer behaves.
//!
//! ## Architecture Overview
//!
//! Every connection runs exactly two tasks:
//!
//! * **Read loop** - consumes inbound frames, enforces the frame size cap and
//!   the read deadline, and hands normalized payloads to an [`InboundHandler`]
//! * **Write loop** - drains the [`Outbox`] mailbox in FIFO order, coalesces
//!   whatever has accumulated into a single frame, and sends a ping every
//!   `ping_period`
//!
//! The two loops share a per-connection cancellation token. Whichever loop
//! terminates first cancels it, and the other loop observes the cancellation
//! and terminates too. The write half closes the underlying stream once.
//!
//! ### Message Flow
//!
//! 1. Producers call [`Outbox::enqueue`] (never blocks; fails when full)
//! 2. The write loop wakes, drains every queued message and joins them with `\n`
//! 3. The joined payload is written as one frame, bounded by `write_wait`
//! 4. Inbound frames reset the read deadline and reach the [`InboundHandler`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use vanilla_pump::{spawn_pump, LogInbound, PumpConfig, Subject};
//!
//! # async fn run(ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) {
//! let server_token = CancellationToken::new();
//! let handle = spawn_pump(
//!     ws,
//!     Subject::new("aspirin2d"),
//!     PumpConfig::default(),
//!     Arc::new(LogInbound),
//!     &server_token,
//! );
//! handle.enqueue("hello").ok();
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Neither loop returns an error to a caller. Each loop ends with a
//! [`Closure`] that classifies the termination as expected (peer went away,
//! local shutdown) or anomalous (deadline expiry, oversized frame, protocol
//! failure). [`PumpHandle::join`] exposes both closures for callers that
//! want them.

pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod inbound;
pub mod lifecycle;
pub mod mailbox;

mod read_loop;
mod write_loop;

pub use connection::{Connection, ConnectionId, Subject};
pub use error::{Closure, ExpectedClosure, PolicyError, PumpError};
pub use heartbeat::HeartbeatPolicy;
pub use inbound::{normalize, InboundHandler, LogInbound};
pub use lifecycle::{spawn_pump, PumpConfig, PumpHandle, PumpOutcome};
pub use mailbox::{mailbox, EnqueueError, MailboxReceiver, Outbox};
