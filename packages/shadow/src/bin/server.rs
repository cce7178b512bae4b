//! Olympus-Shadow Server
//!
//! HTTP surface for the shadow decision pipeline: health, a decide
//! endpoint, and the campaign summary aggregates.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use olympus_corpus::RuleCorpus;
use olympus_ledger::OlympusHome;
use olympus_shadow::{
    DecisionError, DecisionRequest, ShadowLedgers, ShadowPipeline, ShadowSummary, Verdict,
};

struct AppState {
    pipeline: ShadowPipeline,
    ledgers: Mutex<ShadowLedgers>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    corpus_version: String,
}

#[derive(Debug, Serialize)]
struct DecideResponse {
    shadow_verdict: Verdict,
    escalated: bool,
    attribution: olympus_shadow::Attribution,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocker: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let corpus = Arc::new(RuleCorpus::builtin()?);
    let home = OlympusHome::from_env();
    let state = Arc::new(AppState {
        pipeline: ShadowPipeline::new(corpus),
        ledgers: Mutex::new(ShadowLedgers::open(home)?),
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/decide", post(decide))
        .route("/v1/summary", get(summary))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");
    tracing::info!("olympus shadow server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        corpus_version: state.pipeline.corpus().version().to_string(),
    })
}

async fn decide(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecideResponse>, (StatusCode, Json<ErrorResponse>)> {
    let decision = state.pipeline.decide(&request).map_err(|err| match err {
        DecisionError::Input(input) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                code: input.code().to_string(),
                message: input.to_string(),
            }),
        ),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                code: "ERR_INTERNAL".to_string(),
                message: other.to_string(),
            }),
        ),
    })?;

    // Malformed input never reaches here; only decided requests are
    // recorded.
    if let Err(err) = state.ledgers.lock().record(decision.attribution.clone()) {
        tracing::error!(error = %err, "ledger append failed");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                code: "ERR_LEDGER".to_string(),
                message: err.to_string(),
            }),
        ));
    }

    Ok(Json(DecideResponse {
        shadow_verdict: decision.shadow_verdict,
        escalated: decision.escalated,
        attribution: decision.attribution,
        blocker: decision.blocker,
    }))
}

async fn summary(State(state): State<Arc<AppState>>) -> Json<ShadowSummary> {
    Json(state.ledgers.lock().summary())
}
