//! Main application entry point for the vanilla game server
//!
//! Provides CLI interface, configuration loading, and server startup.

mod cli;
mod config;
mod logging;
mod signals;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use cli::CliArgs;
use config::AppConfig;
use game_server::{ConnectionRegistry, GameServer};
use logging::setup_logging;
use signals::wait_for_shutdown_signal;

/// Interval between connection count reports.
const HEALTH_INTERVAL: Duration = Duration::from_secs(60);

/// Main application struct
pub struct Application {
    config: AppConfig,
    server: GameServer,
}

impl Application {
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        // Load configuration first (before logging setup)
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        config.apply_cli(&args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {}", e).into());
        }

        setup_logging(&config.logging)?;
        display_banner();

        let server = GameServer::new(config.to_server_config()?);
        info!("📂 Config: {}", args.config_path.display());

        Ok(Self { config, server })
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("📋 Configuration Summary:");
        info!("  🌐 REST address: {}", self.config.server.http_address);
        info!("  🔌 WebSocket address: {}", self.config.server.ws_address);
        info!(
            "  💓 Pong wait: {}ms | Write wait: {}ms",
            self.config.websocket.pong_wait_ms, self.config.websocket.write_wait_ms
        );
        info!(
            "  📦 Max message: {} bytes | Mailbox: {} messages",
            self.config.websocket.max_message_size, self.config.websocket.mailbox_capacity
        );

        let server = self.server.start().await?;
        let monitoring_handle = spawn_health_monitor(Arc::clone(server.registry()));

        info!("✅ Vanilla server is now running!");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        let signal = wait_for_shutdown_signal().await?;
        info!("📡 Received {}, initiating graceful shutdown...", signal);

        monitoring_handle.abort();
        server.stop().await?;

        info!("👋 Vanilla server shutdown complete");
        Ok(())
    }
}

fn spawn_health_monitor(registry: Arc<ConnectionRegistry>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEALTH_INTERVAL);
        // First tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            info!("📊 System Health - {} live connections", registry.len());
        }
    })
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start application: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║             🍦 VANILLA SERVER 🍦         ║");
    info!("║                  v{}                  ║", version);
    info!("║                                          ║");
    info!("║  JWT-gated REST + WebSocket gateway      ║");
    info!("║  Heartbeat-managed connection pump       ║");
    info!("╚══════════════════════════════════════════╝");
}
