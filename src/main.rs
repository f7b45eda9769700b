use std::sync::Arc;

use futures::StreamExt;

use scripture_companion::channels::{Channel, CliChannel, OutgoingResponse, TelegramChannel};
use scripture_companion::config::CompanionConfig;
use scripture_companion::llm::{GeminiProvider, LlmProvider};
use scripture_companion::session::TurnEngine;
use scripture_companion::store::{ContextStore, DriveStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    eprintln!("📖 Scripture Companion v{}", env!("CARGO_PKG_VERSION"));

    let Some(llm) = GeminiProvider::from_env() else {
        eprintln!("Error: GEMINI_API_KEY not set");
        eprintln!("  export GEMINI_API_KEY=...");
        std::process::exit(1);
    };
    let llm: Arc<dyn LlmProvider> = Arc::new(llm);
    eprintln!("   Backend: {}", llm.name());

    let store: Arc<dyn ContextStore> = match DriveStore::from_env() {
        Some(drive) => {
            eprintln!("   Store: Google Drive");
            Arc::new(drive)
        }
        None => {
            eprintln!("   Store: in-memory (GOOGLE_DRIVE_TOKEN not set; state is lost on exit)");
            Arc::new(MemoryStore::new())
        }
    };

    let config = CompanionConfig::from_env();
    eprintln!(
        "   Plan: {}-day horizon, extend {} days when {} remain",
        config.plan_horizon_days, config.extend_chunk_days, config.extend_lookahead_days,
    );

    let engine = Arc::new(TurnEngine::new(store, llm, config));

    // Set up channels: CLI always, Telegram when a bot token is present.
    let mut channels: Vec<Arc<dyn Channel>> = vec![Arc::new(CliChannel::new())];

    if let Ok(telegram_token) = std::env::var("TELEGRAM_BOT_TOKEN") {
        let allowed_users: Vec<String> = std::env::var("TELEGRAM_ALLOWED_USERS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        eprintln!(
            "   Telegram: enabled (allowed: {})",
            if allowed_users.iter().any(|u| u == "*") {
                "everyone".to_string()
            } else {
                allowed_users.join(", ")
            }
        );

        channels.push(Arc::new(TelegramChannel::new(telegram_token, allowed_users)));
    }

    eprintln!(
        "   Channels: {}\n",
        channels
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut handles = Vec::new();
    for channel in channels {
        if let Err(e) = channel.health_check().await {
            tracing::warn!(channel = channel.name(), error = %e, "channel health check failed");
        }

        let mut stream = channel.start().await?;
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let reply = engine.handle_turn(&msg.session_key(), &msg.content).await;
                if let Err(e) = channel.respond(&msg, OutgoingResponse::new(reply)).await {
                    tracing::error!(channel = channel.name(), error = %e, "failed to respond");
                }
            }
            tracing::info!(channel = channel.name(), "channel stream ended");
        }));
    }

    for handle in handles {
        handle.await?;
    }

    Ok(())
}
