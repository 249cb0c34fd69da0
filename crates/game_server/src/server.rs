//! Server lifecycle: binding listeners, serving, and stopping.
//!
//! [`GameServer::start`] returns a [`RunningServer`] value; stopping is done
//! through that value, so there is no process-wide server handle.

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vanilla_pump::{InboundHandler, LogInbound};

use crate::accounts::{AccountStore, MemoryAccountStore};
use crate::api::{self, AppState};
use crate::auth::TokenAuthority;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::gateway::{ConnectionRegistry, Gateway};

/// A configured server that has not been started yet.
pub struct GameServer {
    config: ServerConfig,
    accounts: Arc<dyn AccountStore>,
    inbound: Arc<dyn InboundHandler>,
}

impl GameServer {
    /// Creates a server backed by an in-memory account store that logs
    /// inbound WebSocket messages.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            accounts: Arc::new(MemoryAccountStore::new()),
            inbound: Arc::new(LogInbound),
        }
    }

    pub fn with_account_store(mut self, accounts: Arc<dyn AccountStore>) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn with_inbound_handler(mut self, inbound: Arc<dyn InboundHandler>) -> Self {
        self.inbound = inbound;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds both listeners and starts serving in the background.
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        self.config.validate()?;

        let http_listener = bind_listener(self.config.http_address)?;
        let ws_listener = bind_listener(self.config.ws_address)?;
        let http_addr = local_addr(&http_listener)?;
        let ws_addr = local_addr(&ws_listener)?;

        let shutdown = CancellationToken::new();
        let tokens = Arc::new(TokenAuthority::new(&self.config.auth.jwt_secret));
        let registry = Arc::new(ConnectionRegistry::new());

        let app = api::router(AppState::new(
            self.accounts,
            Arc::clone(&tokens),
            self.config.auth.clone(),
        ));
        let http_shutdown = shutdown.clone().cancelled_owned();
        let http_task = tokio::spawn(async move {
            axum::serve(http_listener, app)
                .with_graceful_shutdown(http_shutdown)
                .await
        });
        info!("🌐 REST API listening on {}", http_addr);

        let gateway = Arc::new(Gateway::new(
            tokens,
            self.config.pump,
            self.inbound,
            registry,
        ));
        let gateway_task = tokio::spawn(Arc::clone(&gateway).serve(ws_listener, shutdown.clone()));
        info!("🔌 WebSocket gateway listening on {}", ws_addr);

        Ok(RunningServer {
            http_addr,
            ws_addr,
            gateway,
            shutdown,
            shutdown_timeout: self.config.shutdown_timeout,
            http_task,
            gateway_task,
        })
    }
}

/// Handle to a started server. Stop it with [`RunningServer::stop`].
pub struct RunningServer {
    http_addr: SocketAddr,
    ws_addr: SocketAddr,
    gateway: Arc<Gateway>,
    shutdown: CancellationToken,
    shutdown_timeout: Duration,
    http_task: JoinHandle<std::io::Result<()>>,
    gateway_task: JoinHandle<()>,
}

impl RunningServer {
    /// Address the REST listener is bound to.
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Address the WebSocket listener is bound to.
    pub fn ws_addr(&self) -> SocketAddr {
        self.ws_addr
    }

    /// Live WebSocket connections.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.gateway.registry()
    }

    /// Cancelled when the server begins stopping.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops both listeners, lets every connection flush its mailbox and
    /// close, and waits for all of it, at most `shutdown_timeout` in total.
    ///
    /// Connections still open at the deadline are cancelled.
    pub async fn stop(self) -> Result<(), ServerError> {
        let RunningServer {
            gateway,
            shutdown,
            shutdown_timeout,
            http_task,
            gateway_task,
            ..
        } = self;

        info!(
            "🛑 Shutting down server ({} live connections)",
            gateway.registry().len()
        );
        let deadline = Instant::now() + shutdown_timeout;
        shutdown.cancel();

        let mut result = Ok(());
        match timeout_at(deadline, gateway_task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("❌ Gateway task failed: {}", e);
                result = Err(ServerError::Internal(format!("gateway task failed: {e}")));
            }
            Err(_) => result = Err(ServerError::ShutdownTimeout(shutdown_timeout)),
        }

        if !gateway.drain(deadline.saturating_duration_since(Instant::now())).await {
            result = result.and(Err(ServerError::ShutdownTimeout(shutdown_timeout)));
        }

        match timeout_at(deadline, http_task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => {
                error!("❌ REST server error: {}", e);
                result = result.and(Err(ServerError::Network(e.to_string())));
            }
            Ok(Err(e)) => {
                error!("❌ REST server task failed: {}", e);
                result = result.and(Err(ServerError::Internal(format!("REST task failed: {e}"))));
            }
            Err(_) => result = result.and(Err(ServerError::ShutdownTimeout(shutdown_timeout))),
        }

        match &result {
            Ok(()) => info!("✅ Server stopped"),
            Err(e) => warn!("⚠️ Server stopped uncleanly: {}", e),
        }
        result
    }
}

fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
    socket.set_reuse_address(true).ok();
    socket
        .bind(&addr.into())
        .map_err(|e| ServerError::Network(format!("Bind to {addr} failed: {e}")))?;
    socket
        .listen(1024)
        .map_err(|e| ServerError::Network(format!("Listen failed: {e}")))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| ServerError::Network(format!("Non-blocking mode failed: {e}")))?;

    let std_listener: StdTcpListener = socket.into();
    TcpListener::from_std(std_listener)
        .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))
}

fn local_addr(listener: &TcpListener) -> Result<SocketAddr, ServerError> {
    listener
        .local_addr()
        .map_err(|e| ServerError::Network(format!("Local address unavailable: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ephemeral_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.http_address = "127.0.0.1:0".parse().unwrap();
        config.ws_address = "127.0.0.1:0".parse().unwrap();
        config
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_and_stop() {
        let server = GameServer::new(ephemeral_config()).start().await.unwrap();
        assert_ne!(server.http_addr().port(), 0);
        assert_ne!(server.ws_addr().port(), 0);
        assert!(server.registry().is_empty());

        let token = server.shutdown_token();
        server.stop().await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_binding() {
        let mut config = ephemeral_config();
        config.auth.jwt_secret.clear();
        assert!(matches!(
            GameServer::new(config).start().await,
            Err(ServerError::Config(_))
        ));
    }

    #[tokio::test]
    async fn occupied_port_is_a_network_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = ephemeral_config();
        config.http_address = taken.local_addr().unwrap();
        assert!(matches!(
            GameServer::new(config).start().await,
            Err(ServerError::Network(_))
        ));
    }
}
