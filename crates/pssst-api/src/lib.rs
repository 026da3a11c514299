//! The Pssst relay protocol over HTTP.
//!
//! Every mailbox endpoint validates names, verifies the `content-hash`
//! signature of the request, runs the mailbox operation under the owner's
//! lock and persists the record. Every response leaves signed by the relay.

pub mod auth;
pub mod boxes;
pub mod config;
pub mod error;
pub mod locks;
pub mod middleware;
pub mod relay;
pub mod state;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::RelayConfig;
pub use error::ApiError;
pub use state::{AppState, AppStateInner};

pub fn router(state: AppState) -> Router {
    let max_body = state.config.max_body;

    let mailbox = Router::new()
        .route(
            "/1/{user}",
            get(boxes::pull_default)
                .put(boxes::push_default)
                .post(users::create_user)
                .delete(users::delete_user),
        )
        .route(
            "/1/{user}/{box}",
            get(boxes::get_box)
                .put(boxes::push_box)
                .post(boxes::create_box)
                .delete(boxes::delete_box),
        );

    let info = Router::new()
        .route("/", get(relay::index))
        .route("/key", get(relay::key))
        .route("/time", get(relay::time));

    Router::new()
        .merge(mailbox)
        .merge(info)
        .fallback(relay::not_found)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::sign_response,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
