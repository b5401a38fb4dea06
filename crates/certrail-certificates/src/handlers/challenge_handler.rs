use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::{debug, error};

use super::types::ChallengeAppState;
use crate::certificates::challenge_filename;

const NOT_FOUND_BODY: &str = "Verification not found";

/// Routes answering HTTP-01 challenge fetches from the CA
pub fn configure_routes() -> Router<Arc<ChallengeAppState>> {
    Router::new().route("/.well-known/acme-challenge/{token}", get(serve_challenge))
}

async fn serve_challenge(
    State(app_state): State<Arc<ChallengeAppState>>,
    Path(token): Path<String>,
) -> Response {
    let filename = challenge_filename(&token);

    match app_state.challenges.lookup(&filename).await {
        Ok(Some(content)) => {
            debug!("Serving challenge {}", filename);
            (StatusCode::OK, content).into_response()
        }
        Ok(None) => (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response(),
        Err(e) => {
            error!("Failed to look up challenge {}: {}", filename, e);
            (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
        }
    }
}
