use std::sync::Arc;
use std::time::Duration;

use discord_export::config::ServerConfig;
use discord_export::discord::{DiscordClient, MessageSource};
use discord_export::export::Exporter;
use discord_export::server::{AppState, router};
use discord_export::session::{SessionStore, spawn_sweep_task};

/// How often expired exports are swept at most.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    if !dotenv_loaded {
        tracing::info!("No .env file found, using environment variables");
    }

    let config = ServerConfig::from_env()?;

    let (ws_scheme, http_scheme, authority) = if config.is_local() {
        ("ws", "http", format!("{}:{}", config.domain, config.port))
    } else {
        ("wss", "https", config.domain.clone())
    };

    eprintln!("📦 Discord Export v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   WebSocket: {ws_scheme}://{authority}/ws");
    eprintln!("   Download:  {http_scheme}://{authority}/download/{{id}}");
    eprintln!("   Discord API: {}", config.discord_api_base);
    eprintln!("   Allowed origins: {}", config.allowed_origins.join(", "));
    eprintln!(
        "   Retention: {}, max {}\n",
        config
            .retention
            .ttl
            .map(|ttl| format!("{}s", ttl.as_secs()))
            .unwrap_or_else(|| "forever".to_string()),
        config
            .retention
            .max_entries
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unbounded".to_string()),
    );

    // ── Session store ──────────────────────────────────────────────────
    let sessions = SessionStore::new(config.retention);
    if let Some(ttl) = config.retention.ttl {
        let _sweep_handle = spawn_sweep_task(Arc::clone(&sessions), ttl.min(MAX_SWEEP_INTERVAL));
    }

    // ── Exporter ───────────────────────────────────────────────────────
    let source: Arc<dyn MessageSource> =
        Arc::new(DiscordClient::new(config.discord_api_base.clone()));
    let exporter = Exporter::new(source, sessions, config.export.clone());

    let app = router(AppState::new(exporter, config.allowed_origins.clone()));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "Discord Export server started");
    axum::serve(listener, app).await?;

    Ok(())
}
