use axum::{
    body::{self, Body, Bytes},
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;

use pssst_crypto::signing::HEADER;

use crate::error::ErrorDetail;
use crate::state::AppState;

/// Sign every response body with the relay key.
///
/// Runs outermost on the relay routes, so rejections produced by handlers,
/// extractors and the fallback are signed the same way as successes. A 500
/// gets its error text as body only in debug mode.
pub async fn sign_response(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let (mut parts, body) = response.into_parts();

    let bytes = match body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to buffer response body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let bytes = match parts.extensions.remove::<ErrorDetail>() {
        Some(detail) if state.config.debug => Bytes::from(detail.0),
        _ => bytes,
    };

    let signer = state.clone();
    let content = bytes.clone();
    let signed = tokio::task::spawn_blocking(move || signer.crypto.sign(&content)).await;

    let content_hash = match signed {
        Ok(Ok(hash)) => hash,
        Ok(Err(e)) => {
            error!("Failed to sign response: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match HeaderValue::from_str(&content_hash.to_string()) {
        Ok(value) => {
            parts.headers.insert(HeaderName::from_static(HEADER), value);
        }
        Err(e) => {
            error!("Invalid content-hash header: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    parts.headers.remove(header::CONTENT_LENGTH);
    if !bytes.is_empty() && !parts.headers.contains_key(header::CONTENT_TYPE) {
        parts
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    }

    Response::from_parts(parts, Body::from(bytes))
}
