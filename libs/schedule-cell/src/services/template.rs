use std::sync::Arc;

use tracing::{debug, info, warn};

use provider_cell::{ConnectionGate, Provider, ProviderKind};
use shared_config::AppConfig;
use shared_models::auth::{ActorRole, User};

use crate::models::{validate_sessions, CalendarKey, ScheduleError, ScheduleTemplate, Session, TemplateFilter};
use crate::store::{SupabaseTemplateStore, TemplateStore};

/// Declared sessions per doctor, hospital and calendar key.
pub struct TemplateService {
    gate: ConnectionGate,
    templates: Arc<dyn TemplateStore>,
}

impl TemplateService {
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self {
            gate: ConnectionGate::new(config, auth_token),
            templates: Arc::new(SupabaseTemplateStore::new(config, auth_token)),
        }
    }

    pub fn with_stores(gate: ConnectionGate, templates: Arc<dyn TemplateStore>) -> Self {
        Self { gate, templates }
    }

    /// Admins, or the user owning either side of the pair, may edit its templates.
    pub async fn authorize_editor(
        &self,
        actor: &User,
        doctor_ref: &str,
        hospital_ref: &str,
    ) -> Result<(Provider, Provider), ScheduleError> {
        let doctor = self.gate.directory().require(ProviderKind::Doctor, doctor_ref).await?;
        let hospital = self.gate.directory().require(ProviderKind::Hospital, hospital_ref).await?;

        let allowed = actor.actor_role() == Some(ActorRole::Admin)
            || doctor.owner_user_id == actor.id
            || hospital.owner_user_id == actor.id;
        if !allowed {
            warn!("User {} may not edit schedules of doctor {} at hospital {}", actor.id, doctor.id, hospital.id);
            return Err(ScheduleError::Forbidden(
                "only the doctor or hospital of this schedule may change it".to_string(),
            ));
        }
        Ok((doctor, hospital))
    }

    pub async fn upsert_template(
        &self,
        doctor_ref: &str,
        hospital_ref: &str,
        calendar_key: CalendarKey,
        sessions: Vec<Session>,
    ) -> Result<ScheduleTemplate, ScheduleError> {
        let doctor = self.gate.directory().require(ProviderKind::Doctor, doctor_ref).await?;
        let hospital = self.gate.directory().require(ProviderKind::Hospital, hospital_ref).await?;

        self.gate.ensure_active(doctor.id, hospital.id).await?;

        calendar_key.validate()?;
        validate_sessions(&sessions)?;

        let template = self
            .templates
            .upsert(ScheduleTemplate::new(doctor.id, hospital.id, calendar_key, sessions))
            .await?;

        info!(
            "Stored template {} ({}) for doctor {} at hospital {}",
            template.id,
            template.calendar_key.storage_key(),
            doctor.id,
            hospital.id
        );
        Ok(template)
    }

    pub async fn get_templates(
        &self,
        doctor_ref: Option<&str>,
        hospital_ref: Option<&str>,
        calendar_key: Option<CalendarKey>,
    ) -> Result<Vec<ScheduleTemplate>, ScheduleError> {
        if doctor_ref.is_none() && hospital_ref.is_none() {
            return Err(ScheduleError::ValidationError(
                "a doctor or hospital is required to list templates".to_string(),
            ));
        }

        let mut filter = TemplateFilter {
            calendar_key,
            ..TemplateFilter::default()
        };
        if let Some(reference) = doctor_ref {
            filter.doctor_id = Some(self.gate.directory().require(ProviderKind::Doctor, reference).await?.id);
        }
        if let Some(reference) = hospital_ref {
            filter.hospital_id = Some(self.gate.directory().require(ProviderKind::Hospital, reference).await?.id);
        }

        let templates = self.templates.list(&filter).await?;
        debug!("Found {} templates", templates.len());
        Ok(templates)
    }
}
