//! # Game Server - Vanilla Backend
//!
//! The backend around the connection pump: account registration and login,
//! bearer-gated REST routes, and a token-gated WebSocket gateway that hands
//! every upgraded client to [`vanilla_pump`].
//!
//! ## Architecture Overview
//!
//! * **REST API** ([`api`]) - `/register`, `/login`, and the bearer-gated
//!   `/api/*` routes, served by axum behind a CORS layer
//! * **Auth** ([`auth`]) - input rules, bcrypt hashing, HS256 tokens with a
//!   typed error for every rejection
//! * **Accounts** ([`accounts`]) - the [`AccountStore`] trait and its
//!   in-memory implementation
//! * **Gateway** ([`gateway`]) - accept loop, upgrade-time token check, and
//!   the [`ConnectionRegistry`] used to reach live connections
//! * **Server** ([`server`]) - binds both listeners and returns a
//!   [`RunningServer`] that owns shutdown
//!
//! ### Connection Flow
//!
//! 1. Client logs in over REST and receives a token
//! 2. Client opens `ws://<ws_address>/?token=<token>`
//! 3. The gateway validates the token during the handshake
//! 4. The upgraded stream is handed to a pump; the gateway returns to accepting
//! 5. Other components reach the client through the registry's mailboxes
//!
//! ## Usage
//!
//! ```rust,no_run
//! use game_server::{GameServer, ServerConfig};
//!
//! # async fn run() -> Result<(), game_server::ServerError> {
//! let server = GameServer::new(ServerConfig::default()).start().await?;
//! // ... wait for a shutdown signal ...
//! server.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Lifecycle failures surface as [`ServerError`]. Route failures are
//! [`api::ApiError`] values rendered as `{"reason": ...}` bodies. Connection
//! failures never escape the pump; they are logged when the gateway reaps
//! the connection.

pub mod accounts;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod server;
pub mod stats;

pub use accounts::{Account, AccountStore, MemoryAccountStore, Player};
pub use config::{AuthConfig, ServerConfig};
pub use error::ServerError;
pub use gateway::ConnectionRegistry;
pub use server::{GameServer, RunningServer};
pub use stats::Stats;
