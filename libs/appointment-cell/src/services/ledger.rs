// libs/appointment-cell/src/services/ledger.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use notification_cell::{dispatch, NotificationCategory, Notifier, SupabaseNotifier};
use provider_cell::{ConnectionGate, Provider, ProviderKind};
use schedule_cell::{AvailabilityResolver, SlotKind, TimeRange};
use shared_config::AppConfig;
use shared_models::auth::ActorRole;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentListQuery, AppointmentStatus,
    BookAppointmentRequest, ConsultationType,
};
use crate::services::lifecycle::{AppointmentLifecycleService, TransitionOutcome};
use crate::store::{AppointmentStore, SupabaseAppointmentStore};

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub meeting_base_url: String,
    pub max_emergency_per_slot: u32,
}

impl LedgerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            meeting_base_url: config.meeting_base_url.clone(),
            max_emergency_per_slot: config.max_emergency_per_slot,
        }
    }

    /// Deterministic in the appointment id.
    pub fn meeting_reference(&self, appointment_id: Uuid) -> String {
        format!("{}/appointment-{}", self.meeting_base_url.trim_end_matches('/'), appointment_id)
    }
}

/// Single source of truth for booking state.
pub struct BookingLedger {
    gate: ConnectionGate,
    resolver: AvailabilityResolver,
    store: Arc<dyn AppointmentStore>,
    notifier: Arc<dyn Notifier>,
    lifecycle: AppointmentLifecycleService,
    settings: LedgerSettings,
}

impl BookingLedger {
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self {
            gate: ConnectionGate::new(config, auth_token),
            resolver: AvailabilityResolver::new(config, auth_token),
            store: Arc::new(SupabaseAppointmentStore::new(config, auth_token)),
            notifier: Arc::new(SupabaseNotifier::new(config, auth_token)),
            lifecycle: AppointmentLifecycleService::new(),
            settings: LedgerSettings::from_config(config),
        }
    }

    pub fn with_stores(
        gate: ConnectionGate,
        resolver: AvailabilityResolver,
        store: Arc<dyn AppointmentStore>,
        notifier: Arc<dyn Notifier>,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            gate,
            resolver,
            store,
            notifier,
            lifecycle: AppointmentLifecycleService::new(),
            settings,
        }
    }

    /// Book a slot for a patient. The appointment starts out pending.
    #[instrument(skip(self, request), fields(doctor = %request.doctor_id, date = %request.date))]
    pub async fn book(
        &self,
        patient_id: &str,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking {} for patient {}", request.time_slot, patient_id);

        // **Step 1: Required fields**
        validate_booking_request(patient_id, &request)?;

        // **Step 2: Canonical providers**
        let doctor = self.gate.directory().require(ProviderKind::Doctor, &request.doctor_id).await?;
        let hospital = self.gate.directory().require(ProviderKind::Hospital, &request.hospital_id).await?;

        // **Step 3: Connection must be active**
        self.gate.ensure_active(doctor.id, hospital.id).await?;

        // **Step 4: Slot must exist in the template in force that day**
        let slot = self
            .resolver
            .find_bookable_slot(doctor.id, hospital.id, request.date, &request.time_slot)
            .await?
            .ok_or_else(|| {
                AppointmentError::ValidationError(format!(
                    "no bookable slot {:?} on {}",
                    request.time_slot, request.date
                ))
            })?;

        match slot.kind {
            SlotKind::Break => {
                return Err(AppointmentError::ValidationError("slot is a break".to_string()));
            }
            SlotKind::Emergency if !request.is_emergency => {
                return Err(AppointmentError::ValidationError(
                    "slot is reserved for emergency bookings".to_string(),
                ));
            }
            _ => {}
        }

        // Id-keyed and time-keyed requests must land on the same key.
        let time_slot = TimeRange::parse(&slot.display_time_range)?.to_string();

        // **Step 5: Fast-path occupancy check for a clear error**
        let holders = self
            .store
            .find_active_for_slot(doctor.id, request.date, &time_slot)
            .await?;
        if request.is_emergency {
            let emergencies = holders.iter().filter(|a| a.is_emergency).count();
            if emergencies >= self.settings.max_emergency_per_slot as usize {
                warn!("Emergency quota exhausted for {} {}", request.date, time_slot);
                return Err(AppointmentError::EmergencyCapacityReached {
                    max: self.settings.max_emergency_per_slot,
                });
            }
        } else if holders.iter().any(|a| !a.is_emergency) {
            debug!("Slot {} on {} already held", time_slot, request.date);
            return Err(AppointmentError::SlotAlreadyBooked);
        }

        // **Step 6: Atomic insert, the store re-checks occupancy**
        let now = Utc::now();
        let appointment = self
            .store
            .insert_pending(
                Appointment {
                    id: Uuid::new_v4(),
                    patient_id: patient_id.to_string(),
                    doctor_id: doctor.id,
                    hospital_id: hospital.id,
                    date: request.date,
                    time_slot,
                    consultation_type: request.consultation_type,
                    status: AppointmentStatus::Pending,
                    is_emergency: request.is_emergency,
                    symptoms: request.symptoms.filter(|s| !s.trim().is_empty()),
                    meeting_reference: None,
                    created_at: now,
                    updated_at: now,
                },
                self.settings.max_emergency_per_slot,
            )
            .await?;

        // **Step 7: Tell the hospital, without waiting**
        dispatch(
            self.notifier.clone(),
            hospital.owner_user_id.clone(),
            format!(
                "New {}appointment request for {} at {}",
                if appointment.is_emergency { "emergency " } else { "" },
                appointment.date,
                appointment.time_slot
            ),
            if appointment.is_emergency {
                NotificationCategory::Warning
            } else {
                NotificationCategory::Info
            },
        );

        info!("Appointment {} booked with doctor {}", appointment.id, doctor.id);
        Ok(appointment)
    }

    /// Move an appointment through its lifecycle on behalf of its doctor or hospital.
    #[instrument(skip(self), fields(appointment = %appointment_id))]
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        actor_id: &str,
        actor_role: ActorRole,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.store.get(appointment_id).await?.ok_or(AppointmentError::NotFound)?;

        self.ensure_manager(&appointment, actor_id, actor_role).await?;

        match self.lifecycle.validate_status_transition(appointment.status, new_status)? {
            TransitionOutcome::AlreadyApplied => {
                debug!("Appointment {} already {}", appointment.id, new_status);
                return Ok(appointment);
            }
            TransitionOutcome::Apply => {}
        }

        let meeting_reference = (new_status == AppointmentStatus::Approved
            && appointment.consultation_type == ConsultationType::Online
            && appointment.meeting_reference.is_none())
        .then(|| self.settings.meeting_reference(appointment.id));

        let updated = self
            .store
            .compare_and_set_status(appointment.id, appointment.status, new_status, meeting_reference)
            .await?;

        info!("Appointment {} moved {} -> {}", updated.id, appointment.status, updated.status);

        dispatch(
            self.notifier.clone(),
            updated.patient_id.clone(),
            format!(
                "Your appointment on {} at {} is now {}",
                updated.date, updated.time_slot, updated.status
            ),
            match updated.status {
                AppointmentStatus::Approved | AppointmentStatus::Completed => NotificationCategory::Success,
                AppointmentStatus::Rejected | AppointmentStatus::Cancelled => NotificationCategory::Warning,
                AppointmentStatus::Pending => NotificationCategory::Info,
            },
        );

        Ok(updated)
    }

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store.get(appointment_id).await?.ok_or(AppointmentError::NotFound)
    }

    /// Patients see their own appointments; doctors and hospitals see theirs.
    pub async fn get_for_actor(
        &self,
        appointment_id: Uuid,
        actor_id: &str,
        actor_role: Option<ActorRole>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get(appointment_id).await?;

        match actor_role {
            Some(ActorRole::Admin) => Ok(appointment),
            Some(role @ (ActorRole::Doctor | ActorRole::Hospital)) => {
                self.ensure_manager(&appointment, actor_id, role).await?;
                Ok(appointment)
            }
            _ if appointment.patient_id == actor_id => Ok(appointment),
            _ => Err(AppointmentError::Forbidden("not your appointment".to_string())),
        }
    }

    pub async fn list_for_patient(
        &self,
        patient_id: &str,
        query: &AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.store
            .list(&AppointmentFilter {
                patient_id: Some(patient_id.to_string()),
                date: query.date,
                status: query.status,
                ..AppointmentFilter::default()
            })
            .await
    }

    pub async fn list_for_doctor(
        &self,
        doctor_ref: &str,
        query: &AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let doctor = self.gate.directory().require(ProviderKind::Doctor, doctor_ref).await?;
        self.store
            .list(&AppointmentFilter {
                doctor_id: Some(doctor.id),
                date: query.date,
                status: query.status,
                ..AppointmentFilter::default()
            })
            .await
    }

    pub async fn list_for_hospital(
        &self,
        hospital_ref: &str,
        query: &AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let hospital = self.gate.directory().require(ProviderKind::Hospital, hospital_ref).await?;
        self.store
            .list(&AppointmentFilter {
                hospital_id: Some(hospital.id),
                date: query.date,
                status: query.status,
                ..AppointmentFilter::default()
            })
            .await
    }

    /// Only the assigned doctor or the owning hospital may manage an appointment.
    async fn ensure_manager(
        &self,
        appointment: &Appointment,
        actor_id: &str,
        actor_role: ActorRole,
    ) -> Result<(), AppointmentError> {
        let (kind, expected) = match actor_role {
            ActorRole::Doctor => (ProviderKind::Doctor, appointment.doctor_id),
            ActorRole::Hospital => (ProviderKind::Hospital, appointment.hospital_id),
            ActorRole::Patient | ActorRole::Admin => {
                return Err(AppointmentError::Forbidden(
                    "only the doctor or hospital of this appointment may manage it".to_string(),
                ));
            }
        };

        let actor: Option<Provider> = self.gate.directory().resolve(kind, actor_id).await?.into_provider();
        match actor {
            Some(p) if p.id == expected => Ok(()),
            _ => {
                warn!("{} {} may not manage appointment {}", actor_role, actor_id, appointment.id);
                Err(AppointmentError::Forbidden(
                    "only the doctor or hospital of this appointment may manage it".to_string(),
                ))
            }
        }
    }
}

fn validate_booking_request(patient_id: &str, request: &BookAppointmentRequest) -> Result<(), AppointmentError> {
    let missing = [
        ("patient_id", patient_id),
        ("doctor_id", request.doctor_id.as_str()),
        ("hospital_id", request.hospital_id.as_str()),
        ("time_slot", request.time_slot.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect::<Vec<_>>();

    if !missing.is_empty() {
        return Err(AppointmentError::ValidationError(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn meeting_reference_is_derived_from_the_id() {
        let settings = LedgerSettings {
            meeting_base_url: "https://meet.example.org/".to_string(),
            max_emergency_per_slot: 2,
        };
        let id = Uuid::new_v4();
        assert_eq!(settings.meeting_reference(id), format!("https://meet.example.org/appointment-{}", id));
        assert_eq!(settings.meeting_reference(id), settings.meeting_reference(id));
    }

    #[test]
    fn blank_fields_are_reported_together() {
        let request = BookAppointmentRequest {
            doctor_id: "DOC-001".to_string(),
            hospital_id: " ".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            time_slot: String::new(),
            consultation_type: ConsultationType::Online,
            is_emergency: false,
            symptoms: None,
        };
        let err = validate_booking_request("p1", &request).unwrap_err();
        assert!(err.to_string().contains("hospital_id, time_slot"));
    }
}
