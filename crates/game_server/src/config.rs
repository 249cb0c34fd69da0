//! Server configuration types and defaults.
//!
//! These are the runtime values the server is started with. Loading them
//! from a file is the binary's job; this module only defines the shape and
//! the defaults.

use std::net::SocketAddr;
use std::time::Duration;

use vanilla_pump::PumpConfig;

use crate::auth::{BCRYPT_MAX_COST, BCRYPT_MIN_COST};
use crate::error::ServerError;

/// Token and password settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify tokens
    pub jwt_secret: String,
    /// Lifetime of tokens handed out by `/login`
    pub token_ttl: Duration,
    /// Lifetime of tokens handed out by `/register`
    pub register_token_ttl: Duration,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "vanilla_icecream".to_string(),
            token_ttl: Duration::from_secs(100 * 60 * 60),
            register_token_ttl: Duration::from_secs(60),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Configuration structure for the game server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the REST listener
    pub http_address: SocketAddr,
    /// Address of the WebSocket listener
    pub ws_address: SocketAddr,
    pub auth: AuthConfig,
    /// Heartbeat and mailbox settings applied to every connection
    pub pump: PumpConfig,
    /// Grace period granted to in-flight work on stop
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_address: SocketAddr::from(([127, 0, 0, 1], 8082)),
            ws_address: SocketAddr::from(([127, 0, 0, 1], 8083)),
            auth: AuthConfig::default(),
            pump: PumpConfig::default(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ServerError::Config("jwt secret cannot be empty".to_string()));
        }
        if self.auth.token_ttl.is_zero() || self.auth.register_token_ttl.is_zero() {
            return Err(ServerError::Config("token lifetimes must be positive".to_string()));
        }
        if !(BCRYPT_MIN_COST..=BCRYPT_MAX_COST).contains(&self.auth.bcrypt_cost) {
            return Err(ServerError::Config(format!(
                "bcrypt cost must be between {} and {}",
                BCRYPT_MIN_COST,
                BCRYPT_MAX_COST
            )));
        }
        if self.http_address.port() != 0 && self.http_address == self.ws_address {
            return Err(ServerError::Config(
                "http and websocket listeners need distinct addresses".to_string(),
            ));
        }
        self.pump.policy.validate()?;
        if self.pump.mailbox_capacity == 0 {
            return Err(vanilla_pump::PolicyError::ZeroMailboxCapacity.into());
        }
        Ok(())
    }
}
