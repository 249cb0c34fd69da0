//! Configuration management for the vanilla server.
//!
//! Loads the TOML configuration file, applies command-line overrides,
//! validates the result and converts it into a [`ServerConfig`].

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use game_server::{AuthConfig, ServerConfig};
use serde::{Deserialize, Serialize};
use tracing::info;
use vanilla_pump::{HeartbeatPolicy, PumpConfig};

use crate::cli::CliArgs;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub websocket: WebSocketSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Listener addresses and shutdown behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// REST listener address (e.g., "127.0.0.1:8082")
    pub http_address: String,
    /// WebSocket listener address (e.g., "127.0.0.1:8083")
    pub ws_address: String,
    /// Seconds granted to in-flight work on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_shutdown_timeout() -> u64 {
    5
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_address: "127.0.0.1:8082".to_string(),
            ws_address: "127.0.0.1:8083".to_string(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

/// Token signing and password hashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: String,
    /// Lifetime of login tokens in seconds
    pub token_ttl_secs: u64,
    /// Lifetime of registration tokens in seconds
    pub register_token_ttl_secs: u64,
    pub bcrypt_cost: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        let defaults = AuthConfig::default();
        Self {
            jwt_secret: defaults.jwt_secret,
            token_ttl_secs: defaults.token_ttl.as_secs(),
            register_token_ttl_secs: defaults.register_token_ttl.as_secs(),
            bcrypt_cost: defaults.bcrypt_cost,
        }
    }
}

/// Heartbeat and mailbox limits applied to every WebSocket connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketSettings {
    /// Longest tolerated silence from the peer, in milliseconds
    pub pong_wait_ms: u64,
    /// Ping interval in milliseconds; derived from `pong_wait_ms` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping_period_ms: Option<u64>,
    /// Deadline for a single write, in milliseconds
    pub write_wait_ms: u64,
    /// Largest accepted inbound frame, in bytes
    pub max_message_size: usize,
    /// Pending outbound messages per connection
    pub mailbox_capacity: usize,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        let defaults = PumpConfig::default();
        Self {
            pong_wait_ms: defaults.policy.pong_wait().as_millis() as u64,
            ping_period_ms: None,
            write_wait_ms: defaults.policy.write_wait().as_millis() as u64,
            max_message_size: defaults.policy.max_message_size(),
            mailbox_capacity: defaults.mailbox_capacity,
        }
    }
}

impl WebSocketSettings {
    pub fn to_pump_config(&self) -> Result<PumpConfig, String> {
        let mut policy = HeartbeatPolicy::new(
            Duration::from_millis(self.pong_wait_ms),
            Duration::from_millis(self.write_wait_ms),
            self.max_message_size,
        )
        .map_err(|e| e.to_string())?;
        if let Some(ping_period_ms) = self.ping_period_ms {
            policy = policy
                .with_ping_period(Duration::from_millis(ping_period_ms))
                .map_err(|e| e.to_string())?;
        }
        PumpConfig::new(policy, self.mailbox_capacity).map_err(|e| e.to_string())
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// A missing file is created with the defaults, which are returned.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file values.
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(http_address) = &args.http_address {
            self.server.http_address = http_address.clone();
        }
        if let Some(ws_address) = &args.ws_address {
            self.server.ws_address = ws_address.clone();
        }
        if let Some(log_level) = &args.log_level {
            self.logging.level = log_level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let http = parse_address("http_address", &self.server.http_address)?;
        let ws = parse_address("ws_address", &self.server.ws_address)?;
        if http == ws && http.port() != 0 {
            return Err(format!("http_address and ws_address are both {http}"));
        }

        if self.server.shutdown_timeout_secs == 0 {
            return Err("shutdown_timeout_secs must be greater than zero".to_string());
        }

        if self.auth.jwt_secret.is_empty() {
            return Err("jwt_secret cannot be empty".to_string());
        }
        if self.auth.token_ttl_secs == 0 || self.auth.register_token_ttl_secs == 0 {
            return Err("token lifetimes must be greater than zero".to_string());
        }

        self.websocket.to_pump_config()?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            ));
        }

        Ok(())
    }

    /// Converts to the runtime configuration of the game server.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            http_address: self.server.http_address.parse()?,
            ws_address: self.server.ws_address.parse()?,
            auth: AuthConfig {
                jwt_secret: self.auth.jwt_secret.clone(),
                token_ttl: Duration::from_secs(self.auth.token_ttl_secs),
                register_token_ttl: Duration::from_secs(self.auth.register_token_ttl_secs),
                bcrypt_cost: self.auth.bcrypt_cost,
            },
            pump: self.websocket.to_pump_config()?,
            shutdown_timeout: Duration::from_secs(self.server.shutdown_timeout_secs),
        })
    }
}

fn parse_address(field: &str, value: &str) -> Result<SocketAddr, String> {
    value
        .parse::<SocketAddr>()
        .map_err(|_| format!("Invalid {field}: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid_and_converts() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.http_address.port(), 8082);
        assert_eq!(server_config.ws_address.port(), 8083);
        assert_eq!(server_config.pump, PumpConfig::default());
        assert_eq!(server_config.auth.token_ttl, Duration::from_secs(360_000));
        assert_eq!(server_config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn validation_failures() {
        let mut config = AppConfig::default();
        config.server.http_address = "invalid".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.ws_address = config.server.http_address.clone();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.websocket.ping_period_ms = Some(config.websocket.pong_wait_ms);
        assert!(config.validate().unwrap_err().contains("ping period"));

        let mut config = AppConfig::default();
        config.websocket.mailbox_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn ping_period_override_reaches_policy() {
        let mut settings = WebSocketSettings::default();
        settings.pong_wait_ms = 200;
        settings.ping_period_ms = Some(100);
        let pump = settings.to_pump_config().unwrap();
        assert_eq!(pump.policy.ping_period(), Duration::from_millis(100));

        settings.ping_period_ms = None;
        let pump = settings.to_pump_config().unwrap();
        assert_eq!(pump.policy.ping_period(), Duration::from_millis(180));
    }

    #[test]
    fn cli_overrides_file_values() {
        let mut config = AppConfig::default();
        config.apply_cli(&CliArgs {
            config_path: PathBuf::from("config.toml"),
            http_address: Some("0.0.0.0:9000".to_string()),
            ws_address: None,
            log_level: Some("debug".to_string()),
            json_logs: true,
        });
        assert_eq!(config.server.http_address, "0.0.0.0:9000");
        assert_eq!(config.server.ws_address, "127.0.0.1:8083");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn partial_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(
            &path,
            r#"
[websocket]
pong_wait_ms = 500
mailbox_capacity = 16

[logging]
level = "debug"
"#,
        )
        .await
        .unwrap();

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.websocket.pong_wait_ms, 500);
        assert_eq!(config.websocket.mailbox_capacity, 16);
        assert_eq!(config.websocket.max_message_size, 512);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server, ServerSettings::default());
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "[server\nhttp_address = 1").await.unwrap();
        assert!(AppConfig::load_from_file(&path).await.is_err());
    }
}
