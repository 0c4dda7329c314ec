//! Server initialization and main run loop
//!
//! Contains the main `run()` function that wires stores, the chat engine and
//! the HTTP router, then serves until ctrl-c.

use super::config::{AppConfig, SessionBackend, SessionConfig};
use super::validation::validate_production_config;
use crate::api::{api_router, AppState};
use crate::websocket::websocket_router;
use anyhow::{Context, Result};
use axum::{Extension, Router};
use parentline_core::{
    ChatService, Classifier, GenerationHandler, HttpPassageIndex, HttpSidecar, MemoryStore,
    OAuthClient, RedisStore, RetrievalHandler, SessionStore,
};
use parentline_llm::{LlmProvider, OpenAiCompatConfig, OpenAiCompatProvider};
use parentline_store::Store;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Interval between sweeps of expired chat sessions
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Open the SQLite database named in the configuration
pub async fn open_store(config: &AppConfig) -> Result<Store> {
    Store::from_path(Path::new(&config.database.path))
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))
}

/// Build the chat session store, falling back to memory when Redis is unreachable
pub async fn init_session_store(config: &SessionConfig) -> Result<Arc<dyn SessionStore>> {
    let memory = || -> Result<Arc<dyn SessionStore>> {
        let store = MemoryStore::try_new(config.ttl_secs, config.max_turns)?;
        Ok(Arc::new(store))
    };

    match config.backend {
        SessionBackend::Memory => memory(),
        SessionBackend::Redis => {
            let redis = RedisStore::new(
                &config.redis_url,
                &config.key_prefix,
                config.ttl_secs,
                config.max_turns,
            );
            match redis {
                Ok(store) => match store.ping().await {
                    Ok(()) => {
                        info!("Redis session store initialized");
                        Ok(Arc::new(store))
                    }
                    Err(e) => {
                        warn!("Redis unreachable, using in-memory session store: {}", e);
                        memory()
                    }
                },
                Err(e) => {
                    warn!("Redis unavailable, using in-memory session store: {}", e);
                    memory()
                }
            }
        }
    }
}

/// Build the text-generation provider
pub fn init_llm(config: &AppConfig) -> Result<Arc<dyn LlmProvider>> {
    let llm = &config.llm;
    if llm.api_key.is_empty() {
        warn!("No LLM API key configured; requests will likely be rejected upstream");
    }
    let provider = OpenAiCompatProvider::new(
        OpenAiCompatConfig::new(llm.api_key.clone())
            .with_base_url(llm.base_url.clone())
            .with_model(llm.model.clone())
            .with_max_tokens(llm.max_tokens)
            .with_temperature(llm.temperature)
            .with_timeout(Duration::from_secs(llm.timeout_secs)),
    )
    .context("Failed to initialize LLM provider")?;
    info!(model = %llm.model, "LLM provider initialized: {}", provider.name());
    Ok(Arc::new(provider))
}

/// Assemble the chat engine
pub fn init_chat(
    config: &AppConfig,
    sessions: Arc<dyn SessionStore>,
    llm: Arc<dyn LlmProvider>,
) -> Result<ChatService> {
    let sidecar = HttpSidecar::new(
        config.sidecar.base_url.clone(),
        Duration::from_secs(config.sidecar.timeout_secs),
    )
    .context("Failed to initialize sidecar client")?;
    let index = HttpPassageIndex::new(
        config.retrieval.index_url.clone(),
        Duration::from_secs(config.retrieval.timeout_secs),
    )
    .context("Failed to initialize passage index client")?;

    let retrieval_cfg = &config.retrieval;
    let generation = Arc::new(GenerationHandler::new(
        llm.clone(),
        config.llm.model.clone(),
        retrieval_cfg.history_turns,
    ));
    let retrieval = RetrievalHandler::new(
        Arc::new(index),
        generation.clone(),
        retrieval_cfg.top_k,
        retrieval_cfg.max_context_chars,
    );

    Ok(ChatService::new(
        sessions,
        Classifier::new(llm, config.llm.model.clone()),
        Arc::new(sidecar),
        retrieval,
        generation,
        config.chat.routes.clone(),
        retrieval_cfg.history_turns,
    ))
}

/// Build the full HTTP application
pub fn build_app(state: AppState) -> Router {
    let store = state.store.clone();
    Router::new()
        .merge(api_router(state.clone()))
        .merge(websocket_router(state))
        .layer(Extension(store))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Periodically drop expired chat sessions
fn start_session_cleanup_task(sessions: Arc<dyn SessionStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match sessions.cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => info!("Cleanup: removed {} expired chat sessions", removed),
                Err(e) => warn!("Session cleanup failed: {}", e),
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install ctrl-c handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Run the server
pub async fn run(config: AppConfig) -> Result<()> {
    info!(
        "Starting Parentline v{}",
        env!("CARGO_PKG_VERSION")
    );

    validate_production_config(&config)?;

    let store = open_store(&config).await?;
    let sessions = init_session_store(&config.session).await?;
    let llm = init_llm(&config)?;
    let chat = init_chat(&config, sessions.clone(), llm)?;
    let profiles = OAuthClient::new().context("Failed to initialize OAuth client")?;

    let state = AppState {
        store,
        chat: Arc::new(chat),
        profiles: Arc::new(profiles),
        auth: config.auth.clone(),
    };

    let cleanup = start_session_cleanup_task(sessions);
    let app = build_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    cleanup.abort();
    info!("Parentline shutdown complete");
    Ok(())
}

/// Load the built-in milestone catalogue into the database
pub async fn seed_milestones(config: &AppConfig) -> Result<u64> {
    let store = open_store(config).await?;
    let inserted = store
        .seed_default_milestones()
        .await
        .context("Failed to seed milestones")?;
    info!(inserted, "Milestones seeded");
    Ok(inserted)
}
