use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, MERGE_DUPLICATES};
use shared_database::DatabaseError;

use crate::models::{CalendarKey, ScheduleError, ScheduleTemplate, TemplateFilter, TemplateRow};

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Replaces the template for `(doctor, hospital, calendar_key)` in one step,
    /// keeping the id and creation time of the row it replaces.
    async fn upsert(&self, template: ScheduleTemplate) -> Result<ScheduleTemplate, ScheduleError>;

    async fn find(
        &self,
        doctor_id: Uuid,
        hospital_id: Uuid,
        key: &CalendarKey,
    ) -> Result<Option<ScheduleTemplate>, ScheduleError>;

    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<ScheduleTemplate>, ScheduleError>;
}

/// Read side of the booking ledger as the resolver needs it: the `time_slot`
/// of every pending or approved appointment for a doctor, hospital and date.
#[async_trait]
pub trait BookingLookup: Send + Sync {
    async fn active_time_slots(
        &self,
        doctor_id: Uuid,
        hospital_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<String>, ScheduleError>;
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseTemplateStore {
    supabase: SupabaseClient,
    auth_token: Option<String>,
}

impl SupabaseTemplateStore {
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            auth_token: auth_token.map(str::to_string),
        }
    }

    async fn select(&self, query: &str) -> Result<Vec<ScheduleTemplate>, ScheduleError> {
        let path = format!("/rest/v1/schedule_templates?{}", query);
        let rows: Vec<TemplateRow> = self
            .supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await?;
        rows.into_iter().map(ScheduleTemplate::try_from).collect()
    }
}

fn key_filter(key: &CalendarKey) -> String {
    format!("calendar_key=eq.{}", urlencoding::encode(&key.storage_key()))
}

#[async_trait]
impl TemplateStore for SupabaseTemplateStore {
    async fn upsert(&self, template: ScheduleTemplate) -> Result<ScheduleTemplate, ScheduleError> {
        // id and created_at are left to column defaults so a replace keeps them.
        let body = json!({
            "doctor_id": template.doctor_id,
            "hospital_id": template.hospital_id,
            "calendar_key": template.calendar_key.storage_key(),
            "sessions": template.sessions,
            "updated_at": Utc::now(),
        });

        let rows = self
            .supabase
            .write_returning(
                Method::POST,
                "/rest/v1/schedule_templates?on_conflict=doctor_id,hospital_id,calendar_key",
                self.auth_token.as_deref(),
                body,
                MERGE_DUPLICATES,
            )
            .await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::Database(DatabaseError::NotFound("template upsert returned no row".to_string())))?;
        let row: TemplateRow = serde_json::from_value(row).map_err(|e| ScheduleError::Database(e.into()))?;
        ScheduleTemplate::try_from(row)
    }

    async fn find(
        &self,
        doctor_id: Uuid,
        hospital_id: Uuid,
        key: &CalendarKey,
    ) -> Result<Option<ScheduleTemplate>, ScheduleError> {
        let query = format!(
            "doctor_id=eq.{}&hospital_id=eq.{}&{}&limit=1",
            doctor_id,
            hospital_id,
            key_filter(key)
        );
        Ok(self.select(&query).await?.into_iter().next())
    }

    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<ScheduleTemplate>, ScheduleError> {
        let mut parts = Vec::new();
        if let Some(doctor_id) = filter.doctor_id {
            parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(hospital_id) = filter.hospital_id {
            parts.push(format!("hospital_id=eq.{}", hospital_id));
        }
        if let Some(key) = &filter.calendar_key {
            parts.push(key_filter(key));
        }
        parts.push("order=calendar_key.asc".to_string());

        self.select(&parts.join("&")).await
    }
}

#[derive(Debug, Deserialize)]
struct TimeSlotRow {
    time_slot: String,
}

/// Reads active appointments straight from the `appointments` table.
pub struct SupabaseBookingLookup {
    supabase: SupabaseClient,
    auth_token: Option<String>,
}

impl SupabaseBookingLookup {
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            auth_token: auth_token.map(str::to_string),
        }
    }
}

#[async_trait]
impl BookingLookup for SupabaseBookingLookup {
    async fn active_time_slots(
        &self,
        doctor_id: Uuid,
        hospital_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<String>, ScheduleError> {
        let path = format!(
            "/rest/v1/appointments?select=time_slot&doctor_id=eq.{}&hospital_id=eq.{}&date=eq.{}&status=in.(pending,approved)",
            doctor_id, hospital_id, date
        );

        let rows: Vec<TimeSlotRow> = self
            .supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await?;
        Ok(rows.into_iter().map(|r| r.time_slot).collect())
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

type TemplateKey = (Uuid, Uuid, CalendarKey);

#[derive(Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<HashMap<TemplateKey, ScheduleTemplate>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn upsert(&self, mut template: ScheduleTemplate) -> Result<ScheduleTemplate, ScheduleError> {
        let key = (template.doctor_id, template.hospital_id, template.calendar_key);
        let mut templates = self.templates.write().await;

        if let Some(existing) = templates.get(&key) {
            template.id = existing.id;
            template.created_at = existing.created_at;
        }
        template.updated_at = Utc::now();

        templates.insert(key, template.clone());
        Ok(template)
    }

    async fn find(
        &self,
        doctor_id: Uuid,
        hospital_id: Uuid,
        key: &CalendarKey,
    ) -> Result<Option<ScheduleTemplate>, ScheduleError> {
        Ok(self.templates.read().await.get(&(doctor_id, hospital_id, *key)).cloned())
    }

    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<ScheduleTemplate>, ScheduleError> {
        let mut found: Vec<ScheduleTemplate> = self
            .templates
            .read()
            .await
            .values()
            .filter(|t| filter.doctor_id.map_or(true, |id| t.doctor_id == id))
            .filter(|t| filter.hospital_id.map_or(true, |id| t.hospital_id == id))
            .filter(|t| filter.calendar_key.map_or(true, |k| t.calendar_key == k))
            .cloned()
            .collect();
        found.sort_by_key(|t| t.calendar_key.storage_key());
        Ok(found)
    }
}
