//! HTTP surface for the orchestrator
//!
//! Deliberately thin: handlers validate input, call into the orchestrator or
//! store, and map the error taxonomy onto status codes. No scan logic lives
//! here.

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::ScanError;
use crate::orchestrator::Orchestrator;

pub mod routes;

/// Build the router. The orchestrator handle is the shared state.
pub fn app(orchestrator: Orchestrator) -> Router {
    Router::new()
        .route("/health", get(routes::health_check))
        .route(
            "/api/scans",
            get(routes::list_scans).post(routes::create_scan),
        )
        .route("/api/scans/:id", get(routes::get_scan))
        .route("/api/scans/:id/cancel", post(routes::cancel_scan))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

/// Bind `addr` and serve until the process stops.
pub async fn serve(orchestrator: Orchestrator, addr: &str) -> Result<()> {
    let app = app(orchestrator);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Error response carrying the mapped status and a JSON `{error}` body.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ScanError> for ApiError {
    fn from(error: ScanError) -> Self {
        Self {
            status: status_for(&error),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.message, "request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

fn status_for(error: &ScanError) -> StatusCode {
    match error {
        ScanError::NotFound(_) => StatusCode::NOT_FOUND,
        ScanError::UnknownKind(_) => StatusCode::BAD_REQUEST,
        conflict if conflict.is_conflict() => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScanState;
    use uuid::Uuid;

    #[test]
    fn taxonomy_maps_onto_status_codes() {
        assert_eq!(
            status_for(&ScanError::NotFound(Uuid::new_v4())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ScanError::AlreadyRunning("host-1".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ScanError::InvalidTransition {
                from: ScanState::Completed,
                to: ScanState::Running
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ScanError::UnknownKind("quantum".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ScanError::Executor("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
