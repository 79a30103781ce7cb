mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use scrivener_api::state::AppStateInner;
use scrivener_core::{Orchestrator, OrchestratorConfig, Stores};
use scrivener_db::Database;
use scrivener_provider::{BoxGenerator, GroqClient};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scrivener=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    let stores = Stores::new(db);

    // Generation provider
    let groq = GroqClient::new(config.api_key, config.base_url.clone())?;
    match groq.check_connection(&config.model).await {
        Ok(()) => info!("Provider reachable at {} (model {})", config.base_url, config.model),
        Err(e) => warn!("Provider check failed, generation may not work: {}", e),
    }

    let orchestrator = Orchestrator::new(
        stores.clone(),
        BoxGenerator::new(groq),
        OrchestratorConfig {
            model: config.model,
            max_turns: config.max_context_turns,
            max_context_chars: config.max_context_chars,
        },
    );
    let state = AppStateInner::new(stores, orchestrator);
    let shutdown = state.shutdown.clone();

    let app = scrivener_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Scrivener server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down; cancelling in-flight generations");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
