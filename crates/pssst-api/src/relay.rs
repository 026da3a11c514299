use axum::{extract::State, response::IntoResponse};

use pssst_crypto::signing;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /`
pub async fn index() -> &'static str {
    "Pssst"
}

/// `GET /key`: the relay's public key, which signs every response.
pub async fn key(State(state): State<AppState>) -> impl IntoResponse {
    state.crypto.public_key_pem().to_string()
}

/// `GET /time`: relay clock in unix seconds, for clients to correct skew.
pub async fn time() -> impl IntoResponse {
    signing::now().to_string()
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
