//! Herald - menu-driven chat bot
//!
//! A Telegram bot offering AI chat, AI-assisted post writing and
//! broadcasting of posts to configured channels, now or on a schedule.

mod api;
mod channels;
mod chunker;
mod config;
mod llm;
mod posts;
mod prompt;
mod render;
mod runtime;
mod scheduler;
mod session;
mod state_machine;
mod telegram;

use api::{create_router, AppState};
use config::Config;
use posts::Publisher;
use runtime::{ConversationRuntime, LlmAiClient, RuntimeManager};
use scheduler::BroadcastScheduler;
use session::SessionStore;
use std::net::SocketAddr;
use std::sync::Arc;
use telegram::TelegramTransport;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    // Outbound
    let transport = Arc::new(TelegramTransport::new(
        &config.bot_token,
        config.telegram_api_base.as_deref(),
    )?);
    let channels = Arc::new(config.channels.clone());
    if channels.is_empty() {
        tracing::warn!("No broadcast channels configured. Set HERALD_CHANNELS.");
    } else {
        tracing::info!(
            channels = ?channels.iter().map(|c| c.key.as_str()).collect::<Vec<_>>(),
            "Channel registry loaded"
        );
    }
    let publisher = Arc::new(Publisher::new(transport, Arc::clone(&channels), config.retry));
    let scheduler = Arc::new(BroadcastScheduler::new(
        Arc::clone(&publisher),
        config.scheduler_poll,
        config.schedule_retention,
    ));

    // AI
    let llm = config.llm.build_service();
    match &llm {
        Some(service) => tracing::info!(model = %service.model_id(), "LLM initialized"),
        None => tracing::warn!("No LLM configured. Set GEMINI_API_KEY."),
    }

    // Conversations
    let sessions = Arc::new(SessionStore::new(config.history_capacity));
    let runtime = ConversationRuntime::new(
        sessions,
        Arc::new(LlmAiClient::new(llm)),
        publisher,
        Arc::clone(&scheduler),
    );
    let manager = Arc::new(RuntimeManager::new(runtime, config.session_ttl));

    // Background tasks
    let shutdown = CancellationToken::new();
    let scheduler_task = tokio::spawn(Arc::clone(&scheduler).run(shutdown.clone()));
    let janitor_task = tokio::spawn(Arc::clone(&manager).run_janitor(shutdown.clone()));

    let state = AppState {
        runtime: manager,
        scheduler,
        channels,
        webhook_secret: config.webhook_secret.as_deref().map(Arc::from),
        admin_token: config.admin_token.as_deref().map(Arc::from),
    };
    if state.admin_token.is_none() {
        tracing::warn!("HERALD_ADMIN_TOKEN not set; admin API rejects all requests");
    }
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Herald listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = tokio::join!(scheduler_task, janitor_task);
    Ok(())
}
