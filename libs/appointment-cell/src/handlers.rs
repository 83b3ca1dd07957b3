// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{ActorRole, User};
use shared_models::error::AppError;

use crate::models::{
    AppointmentListQuery, AppointmentStatus, BookAppointmentRequest, ManageAppointmentRequest,
};
use crate::services::BookingLedger;

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    if user.actor_role() != Some(ActorRole::Patient) {
        return Err(AppError::Forbidden("only patients can book appointments".to_string()));
    }

    let ledger = BookingLedger::new(&state, Some(auth.token()));
    let appointment = ledger.book(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment requested, awaiting hospital approval"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let ledger = BookingLedger::new(&state, Some(auth.token()));

    let appointment = ledger
        .get_for_actor(appointment_id, &user.id, user.actor_role())
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn manage_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<ManageAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let role = user
        .actor_role()
        .ok_or_else(|| AppError::Forbidden("unknown role".to_string()))?;
    let new_status = AppointmentStatus::parse(&request.status).ok_or_else(|| {
        AppError::ValidationError(format!("unknown appointment status {:?}", request.status))
    })?;

    let ledger = BookingLedger::new(&state, Some(auth.token()));
    let appointment = ledger
        .transition(appointment_id, &user.id, role, new_status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let ledger = BookingLedger::new(&state, Some(auth.token()));

    let appointments = ledger.list_for_patient(&user.id, &query).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    if user.actor_role() != Some(ActorRole::Doctor) {
        return Err(AppError::Forbidden("doctor role required".to_string()));
    }

    let ledger = BookingLedger::new(&state, Some(auth.token()));
    let appointments = ledger.list_for_doctor(&user.id, &query).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_hospital_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    if user.actor_role() != Some(ActorRole::Hospital) {
        return Err(AppError::Forbidden("hospital role required".to_string()));
    }

    let ledger = BookingLedger::new(&state, Some(auth.token()));
    let appointments = ledger.list_for_hospital(&user.id, &query).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}
