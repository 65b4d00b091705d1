//! HTTP surface for the request operation.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::pipeline::{ProofRequest, ProofService};
use crate::proving::Prover;

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self.to_body())).into_response()
    }
}

pub fn create_app<P: Prover + 'static>(service: Arc<ProofService<P>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/generate_proof", post(generate_proof::<P>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

async fn health() -> &'static str {
    "ok"
}

async fn generate_proof<P: Prover + 'static>(
    State(service): State<Arc<ProofService<P>>>,
    body: Result<Json<ProofRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return PipelineError::InvalidInput(rejection.body_text()).into_response();
        }
    };
    match service.handle(&request).await {
        Ok(response) => {
            info!(signals = response.public_signals.len(), "proof served");
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            warn!(error = %err.describe(), "proof request failed");
            err.into_response()
        }
    }
}

/// Bind and serve until the process is stopped.
pub async fn serve<P: Prover + 'static>(
    service: Arc<ProofService<P>>,
    addr: std::net::SocketAddr,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, create_app(service)).await?;
    Ok(())
}
