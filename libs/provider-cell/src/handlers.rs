use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ConfirmConnectionRequest, ConnectRequest, ProviderKind, ProviderResolution, ResolveQuery};
use crate::services::{ConnectionGate, ProviderDirectory};

/// Doctor or hospital the caller acts as.
pub fn provider_kind_of(user: &User) -> Result<ProviderKind, AppError> {
    user.actor_role()
        .and_then(ProviderKind::from_role)
        .ok_or_else(|| AppError::Forbidden("only doctors and hospitals manage connections".to_string()))
}

#[axum::debug_handler]
pub async fn request_connection(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<Value>, AppError> {
    let kind = provider_kind_of(&user)?;
    let gate = ConnectionGate::new(&state, Some(auth.token()));

    let connection = gate.request_connection(kind, &user.id, &request.target_code).await?;

    Ok(Json(json!(connection)))
}

#[axum::debug_handler]
pub async fn confirm_connection(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<ConfirmConnectionRequest>,
) -> Result<Json<Value>, AppError> {
    if provider_kind_of(&user)? != ProviderKind::Doctor {
        return Err(AppError::Forbidden("only the doctor may confirm a connection".to_string()));
    }

    let gate = ConnectionGate::new(&state, Some(auth.token()));
    let connection = gate
        .confirm_connection(&user.id, request.connection_id, request.status)
        .await?;

    Ok(Json(json!(connection)))
}

#[axum::debug_handler]
pub async fn list_connections(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let kind = provider_kind_of(&user)?;
    let gate = ConnectionGate::new(&state, Some(auth.token()));

    let connections = gate.list_connections(kind, &user.id).await?;

    Ok(Json(json!({
        "connections": connections,
        "total": connections.len()
    })))
}

// Public: booking UIs resolve whatever identifier they were given.
#[axum::debug_handler]
pub async fn resolve_provider(
    State(state): State<Arc<AppConfig>>,
    Path(reference): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<Value>, AppError> {
    let directory = ProviderDirectory::new(&state, None);

    match directory.resolve_any(query.kind, &reference).await? {
        ProviderResolution::NotFound => Err(AppError::NotFound(format!("provider not found: {}", reference))),
        resolution => Ok(Json(json!(resolution))),
    }
}
