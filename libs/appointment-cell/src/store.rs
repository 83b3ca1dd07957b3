use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use schedule_cell::{BookingLookup, ScheduleError};
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, RETURN_REPRESENTATION};

use crate::models::{Appointment, AppointmentError, AppointmentFilter, AppointmentStatus};

/// Raised by `book_appointment_slot` when the slot's emergency quota is used up.
pub const EMERGENCY_CAPACITY_CODE: &str = "PT409";

/// Postgres unique_violation.
pub const UNIQUE_VIOLATION_CODE: &str = "23505";

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Inserts a pending appointment after re-checking slot occupancy inside
    /// the same atomic step. A non-emergency booking fails if any other
    /// non-emergency booking holds the slot; an emergency booking fails once
    /// `max_emergency` active emergency bookings hold it.
    async fn insert_pending(&self, appointment: Appointment, max_emergency: u32) -> Result<Appointment, AppointmentError>;

    async fn find_active_for_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time_slot: &str,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Moves `id` from `expected` to `new`. Fails with
    /// [`AppointmentError::ConcurrentModification`] if the stored status is no
    /// longer `expected`.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new: AppointmentStatus,
        meeting_reference: Option<String>,
    ) -> Result<Appointment, AppointmentError>;

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError>;
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
    auth_token: Option<String>,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            auth_token: auth_token.map(str::to_string),
        }
    }

    async fn select(&self, query: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?{}", query);
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert_pending(&self, appointment: Appointment, max_emergency: u32) -> Result<Appointment, AppointmentError> {
        let body = json!({
            "p_appointment": appointment,
            "p_max_emergency": max_emergency,
        });

        let created: Appointment = self
            .supabase
            .request(
                Method::POST,
                "/rest/v1/rpc/book_appointment_slot",
                self.auth_token.as_deref(),
                Some(body),
            )
            .await
            .map_err(|e| match e.conflict_code() {
                Some(UNIQUE_VIOLATION_CODE) => AppointmentError::SlotAlreadyBooked,
                Some(EMERGENCY_CAPACITY_CODE) => AppointmentError::EmergencyCapacityReached { max: max_emergency },
                _ => AppointmentError::Database(e),
            })?;

        debug!("Stored appointment {} through booking RPC", created.id);
        Ok(created)
    }

    async fn find_active_for_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time_slot: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.select(&format!(
            "doctor_id=eq.{}&date=eq.{}&time_slot=eq.{}&status=in.(pending,approved)",
            doctor_id,
            date,
            urlencoding::encode(time_slot)
        ))
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.select(&format!("id=eq.{}&limit=1", id)).await?.into_iter().next())
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new: AppointmentStatus,
        meeting_reference: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let mut update = json!({
            "status": new,
            "updated_at": Utc::now(),
        });
        if let Some(reference) = meeting_reference {
            update["meeting_reference"] = Value::String(reference);
        }

        let rows = self
            .supabase
            .write_returning(
                Method::PATCH,
                &format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, expected),
                self.auth_token.as_deref(),
                update,
                RETURN_REPRESENTATION,
            )
            .await?;

        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.into())),
            None => match self.get(id).await? {
                Some(current) => {
                    warn!("Appointment {} moved to {} before update to {}", id, current.status, new);
                    Err(AppointmentError::ConcurrentModification)
                }
                None => Err(AppointmentError::NotFound),
            },
        }
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let mut parts = Vec::new();
        if let Some(patient_id) = &filter.patient_id {
            parts.push(format!("patient_id=eq.{}", urlencoding::encode(patient_id)));
        }
        if let Some(doctor_id) = filter.doctor_id {
            parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(hospital_id) = filter.hospital_id {
            parts.push(format!("hospital_id=eq.{}", hospital_id));
        }
        if let Some(date) = filter.date {
            parts.push(format!("date=eq.{}", date));
        }
        if let Some(status) = filter.status {
            parts.push(format!("status=eq.{}", status));
        }
        parts.push("order=date.asc,time_slot.asc".to_string());

        self.select(&parts.join("&")).await
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

/// Single-lock ledger for tests and embedders. Also answers the availability
/// resolver's booking lookups so both read the same state.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: Mutex<Vec<Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn occupies(a: &Appointment, doctor_id: Uuid, date: NaiveDate, time_slot: &str) -> bool {
    a.status.is_active() && a.doctor_id == doctor_id && a.date == date && a.time_slot == time_slot
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert_pending(&self, appointment: Appointment, max_emergency: u32) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.lock().await;

        let holders = appointments
            .iter()
            .filter(|a| occupies(a, appointment.doctor_id, appointment.date, &appointment.time_slot));

        if appointment.is_emergency {
            if holders.filter(|a| a.is_emergency).count() >= max_emergency as usize {
                return Err(AppointmentError::EmergencyCapacityReached { max: max_emergency });
            }
        } else if holders.filter(|a| !a.is_emergency).count() > 0 {
            return Err(AppointmentError::SlotAlreadyBooked);
        }

        appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn find_active_for_slot(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time_slot: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .appointments
            .lock()
            .await
            .iter()
            .filter(|a| occupies(a, doctor_id, date, time_slot))
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.lock().await.iter().find(|a| a.id == id).cloned())
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new: AppointmentStatus,
        meeting_reference: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.lock().await;
        let appointment = appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AppointmentError::NotFound)?;

        if appointment.status != expected {
            return Err(AppointmentError::ConcurrentModification);
        }

        appointment.status = new;
        if meeting_reference.is_some() {
            appointment.meeting_reference = meeting_reference;
        }
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, AppointmentError> {
        let mut found: Vec<Appointment> = self
            .appointments
            .lock()
            .await
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        found.sort_by(|a, b| (a.date, &a.time_slot).cmp(&(b.date, &b.time_slot)));
        Ok(found)
    }
}

#[async_trait]
impl BookingLookup for InMemoryAppointmentStore {
    async fn active_time_slots(
        &self,
        doctor_id: Uuid,
        hospital_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<String>, ScheduleError> {
        Ok(self
            .appointments
            .lock()
            .await
            .iter()
            .filter(|a| a.status.is_active() && a.doctor_id == doctor_id && a.hospital_id == hospital_id && a.date == date)
            .map(|a| a.time_slot.clone())
            .collect())
    }
}
