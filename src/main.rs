//! Support Flow - guided tech-support dialogue service
//!
//! Walks a user through language, name and problem capture, then a loop of
//! diagnostic steps that ends in resolution or a hand-off ticket.

mod api;
mod config;
mod contract;
mod db;
mod diagnostics;
mod escalation;
mod llm;
mod messages;
mod normalizer;
mod runtime;
mod session;
mod state_machine;

use api::{create_router, AppState};
use config::{Config, DiagnosticMode};
use db::Database;
use diagnostics::DiagnosticEngine;
use runtime::{
    ConcurrencyController, DatabaseStorage, HttpImageAnalyzer, LinkDelivery, LlmClient,
    LockSettings, Orchestrator, ServiceLlmClient, TracingAuditSink,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn build_engine(config: &Config) -> DiagnosticEngine {
    if config.diagnostic_mode == DiagnosticMode::RulesOnly {
        tracing::info!("Diagnostic engine in rules_only mode");
        return DiagnosticEngine::new(None, config.step_timeout);
    }

    match llm::build_service(&config.llm) {
        Some(service) => {
            let client: Arc<dyn LlmClient> = Arc::new(ServiceLlmClient::new(service));
            tracing::info!(model = %client.model_id(), "Diagnostic engine in assisted mode");
            DiagnosticEngine::new(Some(client), config.step_timeout)
        }
        None => {
            tracing::warn!(
                "Assisted mode requested but no backend is configured. Set ANTHROPIC_API_KEY or LLM_GATEWAY. Using rules_only."
            );
            DiagnosticEngine::new(None, config.step_timeout)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "support_flow=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let engine = build_engine(&config);
    let mut orchestrator = Orchestrator::new(
        DatabaseStorage::new(db),
        engine,
        Arc::new(LinkDelivery::new(config.handoff_url.clone())),
        Arc::new(TracingAuditSink),
    );
    if let Some(url) = &config.image_analysis_url {
        tracing::info!(endpoint = %url, "Image analysis enabled");
        orchestrator = orchestrator.with_image_analyzer(Arc::new(HttpImageAnalyzer::new(url)));
    }

    let controller = Arc::new(ConcurrencyController::new(
        Arc::new(orchestrator),
        LockSettings {
            ttl: config.lock_ttl,
            wait: config.lock_wait,
        },
    ));

    // Leases left behind by a previous crash
    controller.reclaim_stale().await;
    let shutdown = CancellationToken::new();
    let reaper = controller.spawn_reaper(shutdown.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(controller))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Support Flow listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    reaper.await?;

    Ok(())
}
