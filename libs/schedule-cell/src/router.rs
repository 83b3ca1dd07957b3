use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/availability/{doctor_id}/{hospital_id}", get(handlers::get_availability))
        .route("/availability/{doctor_id}/{hospital_id}/range", get(handlers::get_availability_range));

    let protected_routes = Router::new()
        .route("/templates", put(handlers::upsert_template).get(handlers::get_templates))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
