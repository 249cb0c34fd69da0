//! WebSocket gateway: token-gated upgrades feeding the connection pump.
//!
//! The token travels in the `token` query parameter of the upgrade request
//! (`ws://host/ws?token=...`). A missing or bad token rejects the upgrade
//! with 401 and a `{"reason": ...}` body; no pump is created. A valid token
//! yields the subject the pump carries for the rest of the connection.
//!
//! Stopping is two-phase. [`Gateway::drain`] closes every mailbox so each
//! connection flushes what it already accepted and sends a close frame, then
//! waits for the connection tasks. Only when that wait overruns are the
//! pumps cancelled outright.

mod registry;

pub use registry::{ConnectionRegistry, Registration, SendError};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::CONTENT_TYPE;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, Uri};
use tokio_tungstenite::{accept_hdr_async_with_config, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use vanilla_pump::{spawn_pump, Closure, InboundHandler, PumpConfig, Subject};

use crate::auth::{AuthError, Claims, TokenAuthority};

/// Accepts WebSocket clients and hands each one to its own pump.
pub struct Gateway {
    tokens: Arc<TokenAuthority>,
    pump: PumpConfig,
    inbound: Arc<dyn InboundHandler>,
    registry: Arc<ConnectionRegistry>,
    tasks: TaskTracker,
    // Parent of every pump token; independent of the accept loop's token.
    connections: CancellationToken,
}

impl Gateway {
    pub fn new(
        tokens: Arc<TokenAuthority>,
        pump: PumpConfig,
        inbound: Arc<dyn InboundHandler>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            tokens,
            pump,
            inbound,
            registry,
            tasks: TaskTracker::new(),
            connections: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Accept loop. Returns once `shutdown` is cancelled.
    ///
    /// Connections accepted here outlive the loop; see [`Gateway::drain`].
    pub async fn serve(self: Arc<Self>, listener: TcpListener, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let gateway = Arc::clone(&self);
                        let shutdown = shutdown.clone();
                        self.tasks.spawn(async move {
                            gateway.handle_connection(stream, peer, shutdown).await;
                        });
                    }
                    Err(e) => {
                        error!("❌ Failed to accept WebSocket connection: {}", e);
                    }
                },
            }
        }
        info!("🔌 WebSocket gateway stopped accepting connections");
    }

    /// Gracefully ends every connection: queued messages are flushed and a
    /// close frame is sent before each pump exits.
    ///
    /// Returns `false` if connections were still running after `grace`; those
    /// are cancelled without flushing.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.registry.close_all();
        self.tasks.close();

        match tokio::time::timeout(grace, self.tasks.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "⚠️ {} connections still open after {:?}, cancelling",
                    self.registry.len(),
                    grace
                );
                self.connections.cancel();
                false
            }
        }
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        peer: SocketAddr,
        shutdown: CancellationToken,
    ) {
        let upgraded = tokio::select! {
            _ = shutdown.cancelled() => return,
            upgraded = self.upgrade(stream) => upgraded,
        };
        let (ws_stream, subject) = match upgraded {
            Ok(upgraded) => upgraded,
            Err(UpgradeFailure::Unauthorized(err)) => {
                debug!(%peer, "rejected websocket upgrade: {}", err);
                return;
            }
            Err(UpgradeFailure::Handshake(err)) => {
                warn!(%peer, "⚠️ WebSocket handshake failed: {}", err);
                return;
            }
        };

        let handle = spawn_pump(
            ws_stream,
            subject.clone(),
            self.pump,
            Arc::clone(&self.inbound),
            &self.connections,
        );
        let id = handle.id();
        self.registry
            .register(id, subject.clone(), handle.outbox().clone());
        info!(connection_id = %id, "🔗 {} connected from {}", subject, peer);

        // `shutdown` is cancelled before `drain` runs, so a connection
        // registered too late for `close_all` is closed here instead.
        if shutdown.is_cancelled() {
            handle.close();
        }

        let outcome = handle.join().await;
        self.registry.unregister(id);

        if outcome.is_clean() {
            info!(connection_id = %id, "👋 {} disconnected", subject);
        } else {
            warn!(
                connection_id = %id,
                "⚠️ {} dropped (read: {}, write: {})",
                subject,
                describe(&outcome.read),
                describe(&outcome.write)
            );
        }
    }

    async fn upgrade(
        &self,
        stream: TcpStream,
    ) -> Result<(WebSocketStream<TcpStream>, Subject), UpgradeFailure> {
        let mut verdict: Option<Result<Claims, AuthError>> = None;
        let tokens = &self.tokens;

        let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let result = authorize(tokens, request.uri());
            let outcome = match &result {
                Ok(_) => Ok(response),
                Err(err) => Err(reject(err)),
            };
            verdict = Some(result);
            outcome
        };

        let upgraded = accept_hdr_async_with_config(
            stream,
            callback,
            Some(self.pump.policy.websocket_config()),
        )
        .await;

        match (upgraded, verdict) {
            (Ok(ws_stream), Some(Ok(claims))) => Ok((ws_stream, Subject::new(claims.jti))),
            (_, Some(Err(err))) => Err(UpgradeFailure::Unauthorized(err)),
            (Err(err), _) => Err(UpgradeFailure::Handshake(err.to_string())),
            (Ok(_), None) => Err(UpgradeFailure::Handshake(
                "handshake completed without authorization".to_string(),
            )),
        }
    }
}

enum UpgradeFailure {
    Unauthorized(AuthError),
    Handshake(String),
}

fn describe(closure: &Closure) -> String {
    match closure {
        Closure::Expected(reason) => format!("{reason:?}"),
        Closure::Anomalous(err) => err.to_string(),
    }
}

/// Extracts the `token` query parameter from an upgrade URI.
pub fn token_from_query(uri: &Uri) -> Option<&str> {
    uri.query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
}

fn authorize(tokens: &TokenAuthority, uri: &Uri) -> Result<Claims, AuthError> {
    tokens.validate(token_from_query(uri).unwrap_or_default())
}

fn reject(err: &AuthError) -> ErrorResponse {
    let body = json!({ "reason": err.to_string() }).to_string();
    let mut response = ErrorResponse::new(Some(body));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn token_is_read_from_query() {
        let uri: Uri = "/ws?foo=1&token=abc.def.ghi".parse().unwrap();
        assert_eq!(token_from_query(&uri), Some("abc.def.ghi"));

        let uri: Uri = "/ws?foo=1".parse().unwrap();
        assert_eq!(token_from_query(&uri), None);

        let uri: Uri = "/ws".parse().unwrap();
        assert_eq!(token_from_query(&uri), None);
    }

    #[test]
    fn authorize_maps_token_failures() {
        let tokens = TokenAuthority::new("secret");
        let good = tokens.issue("aspirin2d", Duration::from_secs(60)).unwrap();

        let uri: Uri = format!("/ws?token={good}").parse().unwrap();
        assert_eq!(authorize(&tokens, &uri).unwrap().jti, "aspirin2d");

        let uri: Uri = "/ws".parse().unwrap();
        assert_eq!(authorize(&tokens, &uri), Err(AuthError::Missing));

        let uri: Uri = "/ws?token=abc".parse().unwrap();
        assert_eq!(authorize(&tokens, &uri), Err(AuthError::Invalid));
    }

    #[test]
    fn rejection_is_json_401() {
        let response = reject(&AuthError::Expired);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(
            response.body().as_deref(),
            Some(r#"{"reason":"token is expired"}"#)
        );
    }
}
