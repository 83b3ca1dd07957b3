use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn provider_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/resolve/{reference}", get(handlers::resolve_provider));

    let protected_routes = Router::new()
        .route("/connect", post(handlers::request_connection))
        .route("/confirm-connection", post(handlers::confirm_connection))
        .route("/connections", get(handlers::list_connections))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
