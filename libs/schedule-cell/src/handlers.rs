use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AvailabilityQuery, AvailabilityRangeQuery, CalendarKey, TemplateQuery, UpsertTemplateRequest,
};
use crate::services::{AvailabilityResolver, TemplateService};

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_ref, hospital_ref)): Path<(String, String)>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let resolver = AvailabilityResolver::new(&state, None);

    let sessions = resolver.resolve(&doctor_ref, &hospital_ref, query.date).await?;

    Ok(Json(json!({
        "date": query.date,
        "sessions": sessions
    })))
}

#[axum::debug_handler]
pub async fn get_availability_range(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_ref, hospital_ref)): Path<(String, String)>,
    Query(query): Query<AvailabilityRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let resolver = AvailabilityResolver::new(&state, None);
    let start_date = query.start_date.unwrap_or_else(|| Utc::now().date_naive());

    let days = resolver
        .resolve_range(&doctor_ref, &hospital_ref, start_date, query.days, query.skip_weekday)
        .await?;

    Ok(Json(json!({
        "start_date": start_date,
        "days": days
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn upsert_template(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<UpsertTemplateRequest>,
) -> Result<Json<Value>, AppError> {
    let service = TemplateService::new(&state, Some(auth.token()));

    service
        .authorize_editor(&user, &request.doctor_id, &request.hospital_id)
        .await?;

    let template = service
        .upsert_template(&request.doctor_id, &request.hospital_id, request.calendar_key, request.sessions)
        .await?;

    Ok(Json(json!(template)))
}

#[axum::debug_handler]
pub async fn get_templates(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<TemplateQuery>,
) -> Result<Json<Value>, AppError> {
    let service = TemplateService::new(&state, Some(auth.token()));

    let calendar_key = match (query.date, query.weekday) {
        (Some(date), _) => Some(CalendarKey::Date(date)),
        (None, Some(weekday)) => Some(CalendarKey::Weekday(weekday)),
        (None, None) => None,
    };

    let templates = service
        .get_templates(query.doctor_id.as_deref(), query.hospital_id.as_deref(), calendar_key)
        .await?;

    Ok(Json(json!({
        "templates": templates,
        "total": templates.len()
    })))
}
