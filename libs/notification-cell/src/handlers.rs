use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{MarkReadRequest, NotificationQuery};
use crate::notifier::{Notifier, SupabaseNotifier};

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Value>, AppError> {
    let notifier = SupabaseNotifier::new(&state, Some(auth.token()));

    let notifications = notifier.list_for_user(&user.id, query.unread_only).await?;

    Ok(Json(json!({
        "notifications": notifications,
        "total": notifications.len()
    })))
}

#[axum::debug_handler]
pub async fn mark_read(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<MarkReadRequest>,
) -> Result<Json<Value>, AppError> {
    let notifier = SupabaseNotifier::new(&state, Some(auth.token()));

    let updated = notifier.mark_read(&user.id, &request.ids).await?;

    Ok(Json(json!({ "updated": updated })))
}
