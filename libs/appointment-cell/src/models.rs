// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate};
use std::fmt;
use thiserror::Error;

use provider_cell::ProviderError;
use schedule_cell::ScheduleError;
use shared_database::DatabaseError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: String,
    pub doctor_id: Uuid,
    pub hospital_id: Uuid,
    pub date: NaiveDate,
    /// Canonical `"HH:MM - HH:MM"` range of the booked slot.
    pub time_slot: String,
    pub consultation_type: ConsultationType,
    pub status: AppointmentStatus,
    pub is_emergency: bool,
    pub symptoms: Option<String>,
    pub meeting_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Pending and approved appointments hold their slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Approved)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected | AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(AppointmentStatus::Pending),
            "approved" => Some(AppointmentStatus::Approved),
            "rejected" => Some(AppointmentStatus::Rejected),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" | "canceled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Approved => write!(f, "approved"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationType {
    Online,
    #[serde(alias = "in-person", alias = "offline")]
    InPerson,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: String,
    pub hospital_id: String,
    pub date: NaiveDate,
    /// Slot id or `"HH:MM - HH:MM"` range.
    pub time_slot: String,
    pub consultation_type: ConsultationType,
    #[serde(default)]
    pub is_emergency: bool,
    pub symptoms: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManageAppointmentRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub patient_id: Option<String>,
    pub doctor_id: Option<Uuid>,
    pub hospital_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.patient_id.as_ref().map_or(true, |p| &appointment.patient_id == p)
            && self.doctor_id.map_or(true, |d| appointment.doctor_id == d)
            && self.hospital_id.map_or(true, |h| appointment.hospital_id == h)
            && self.date.map_or(true, |d| appointment.date == d)
            && self.status.map_or(true, |s| appointment.status == s)
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("slot already booked")]
    SlotAlreadyBooked,

    #[error("emergency capacity for this slot is exhausted ({max} bookings)")]
    EmergencyCapacityReached { max: u32 },

    #[error("Cannot transition appointment from {from} to {to}")]
    InvalidStatusTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Appointment was modified concurrently, retry with fresh state")]
    ConcurrentModification,

    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound => AppError::NotFound(err.to_string()),
            AppointmentError::SlotAlreadyBooked
            | AppointmentError::EmergencyCapacityReached { .. }
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::ConcurrentModification => AppError::Conflict(err.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::Provider(e) => e.into(),
            AppointmentError::Schedule(e) => e.into(),
            AppointmentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
