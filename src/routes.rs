use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::LifecycleError;
use crate::lifecycle::{MSG_GENERATED, MSG_INVALID, MSG_VALID};
use crate::panel::{OutputPanel, PanelFeed};
use crate::session::SessionHandle;
use crate::types::{
    ErrorResponse, GenerateRequest, GenerateResponse, HealthResponse, ReleaseResponse,
    StatusResponse, VerifyResponse,
};

pub const MSG_SAVED_PROOFS: &str = "This feature is under development.";

/// Shared application state passed to all route handlers.
///
/// The adapter keeps no proof state of its own: commands go to the session,
/// and the panel only mirrors the session's status events.
pub struct AppState {
    pub session: SessionHandle,
    pub panel: Mutex<PanelFeed>,
}

impl AppState {
    pub fn new(session: SessionHandle) -> Self {
        let panel = Mutex::new(PanelFeed::new(session.subscribe()));
        Self { session, panel }
    }

    fn panel_snapshot(&self) -> OutputPanel {
        match self.panel.lock() {
            Ok(mut feed) => feed.refresh().clone(),
            Err(poisoned) => poisoned.into_inner().refresh().clone(),
        }
    }
}

type ApiResponse = (StatusCode, Json<serde_json::Value>);

fn json_response<T: serde::Serialize>(status: StatusCode, body: T) -> ApiResponse {
    let value = serde_json::to_value(body).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize response: {}", e);
        serde_json::Value::Null
    });
    (status, Json(value))
}

fn error_response(err: &LifecycleError) -> ApiResponse {
    let status = match err {
        LifecycleError::Input(_) => StatusCode::BAD_REQUEST,
        LifecycleError::State(_) => StatusCode::CONFLICT,
        LifecycleError::Backend(_) => StatusCode::BAD_GATEWAY,
        LifecycleError::SessionClosed => StatusCode::SERVICE_UNAVAILABLE,
    };
    json_response(
        status,
        ErrorResponse {
            error: err.to_string(),
        },
    )
}

/// POST /generate — validate the form fields and generate a proof.
///
/// Request body: GenerateRequest { amount, term, txHash } (raw text)
/// Response: GenerateResponse { message, verifyEnabled }
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> impl IntoResponse {
    tracing::info!("Generate requested");
    match state.session.submit(&req.amount, &req.term, &req.tx_hash).await {
        Ok(()) => json_response(
            StatusCode::OK,
            GenerateResponse {
                message: MSG_GENERATED.to_string(),
                verify_enabled: true,
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// POST /verify — verify the proof currently held by the session.
///
/// Response: VerifyResponse { isValid, message }
pub async fn verify_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::info!("Verify requested");
    match state.session.verify().await {
        Ok(is_valid) => json_response(
            StatusCode::OK,
            VerifyResponse {
                is_valid,
                message: if is_valid { MSG_VALID } else { MSG_INVALID }.to_string(),
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// POST /release — free the held proof. Safe to repeat.
pub async fn release_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = state.session.release().await {
        return error_response(&e);
    }
    json_response(
        StatusCode::OK,
        ReleaseResponse {
            state: state.session.state(),
        },
    )
}

/// GET /status — proof state plus the output area.
///
/// Answers immediately, even while a proof is being generated. Verify
/// enablement is derived from the proof state alone.
pub async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let proof_state = state.session.state();
    let panel = state.panel_snapshot();
    json_response(
        StatusCode::OK,
        StatusResponse {
            verify_enabled: proof_state.has_proof(),
            busy: state.session.is_busy(),
            state: proof_state,
            output: panel.output,
            last_status: panel.last_status,
        },
    )
}

/// GET /saved-proofs — placeholder; proofs are never persisted.
pub async fn saved_proofs_handler() -> impl IntoResponse {
    json_response(
        StatusCode::NOT_IMPLEMENTED,
        ErrorResponse {
            error: MSG_SAVED_PROOFS.to_string(),
        },
    )
}

/// GET /health — Health check endpoint.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "ok".to_string(),
            backend: state.session.backend_name().to_string(),
        },
    )
}

/// Build the axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    use axum::routing::{get, post};
    use tower_http::cors::{Any, CorsLayer};

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    axum::Router::new()
        .route("/generate", post(generate_handler))
        .route("/verify", post(verify_handler))
        .route("/release", post(release_handler))
        .route("/status", get(status_handler))
        .route("/saved-proofs", get(saved_proofs_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}
