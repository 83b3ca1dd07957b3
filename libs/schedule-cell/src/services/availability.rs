use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::debug;
use uuid::Uuid;

use provider_cell::{ProviderDirectory, ProviderKind};
use shared_config::AppConfig;

use crate::models::{
    weekday_index, CalendarKey, DayAvailability, ResolvedSession, ResolvedSlot, ScheduleError,
    ScheduleTemplate, Slot, SlotKind, SlotStatus, WeekdayIndex, MAX_RANGE_DAYS, SATURDAY,
};
use crate::store::{BookingLookup, SupabaseBookingLookup, SupabaseTemplateStore, TemplateStore};

/// Merges declared templates with live bookings. Nothing is cached: every
/// call reads the booking ledger again.
pub struct AvailabilityResolver {
    directory: ProviderDirectory,
    templates: Arc<dyn TemplateStore>,
    bookings: Arc<dyn BookingLookup>,
    window_days: u32,
}

impl AvailabilityResolver {
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self {
            directory: ProviderDirectory::new(config, auth_token),
            templates: Arc::new(SupabaseTemplateStore::new(config, auth_token)),
            bookings: Arc::new(SupabaseBookingLookup::new(config, auth_token)),
            window_days: config.availability_window_days,
        }
    }

    pub fn with_stores(
        directory: ProviderDirectory,
        templates: Arc<dyn TemplateStore>,
        bookings: Arc<dyn BookingLookup>,
        window_days: u32,
    ) -> Self {
        Self { directory, templates, bookings, window_days }
    }

    pub async fn resolve(
        &self,
        doctor_ref: &str,
        hospital_ref: &str,
        date: NaiveDate,
    ) -> Result<Vec<ResolvedSession>, ScheduleError> {
        let (doctor_id, hospital_id) = self.resolve_pair(doctor_ref, hospital_ref).await?;
        self.resolve_ids(doctor_id, hospital_id, date).await
    }

    /// `num_days` consecutive calendar days from `start_date`, leaving out
    /// days that fall on `skip_weekday` (Saturday unless told otherwise).
    /// At most [`MAX_RANGE_DAYS`] days are resolved per call.
    pub async fn resolve_range(
        &self,
        doctor_ref: &str,
        hospital_ref: &str,
        start_date: NaiveDate,
        num_days: Option<u32>,
        skip_weekday: Option<WeekdayIndex>,
    ) -> Result<Vec<DayAvailability>, ScheduleError> {
        let num_days = num_days.unwrap_or(self.window_days.min(MAX_RANGE_DAYS));
        if num_days > MAX_RANGE_DAYS {
            return Err(ScheduleError::ValidationError(format!(
                "days must be at most {}, got {}",
                MAX_RANGE_DAYS, num_days
            )));
        }
        let skip = skip_weekday.unwrap_or(SATURDAY);

        let (doctor_id, hospital_id) = self.resolve_pair(doctor_ref, hospital_ref).await?;

        let mut days = Vec::new();
        for offset in 0..num_days {
            let date = start_date.checked_add_days(Days::new(offset as u64)).ok_or_else(|| {
                ScheduleError::ValidationError(format!("date range starting {} runs past the calendar", start_date))
            })?;
            let weekday = weekday_index(date);
            if weekday == skip {
                continue;
            }
            let sessions = self.resolve_ids(doctor_id, hospital_id, date).await?;
            days.push(DayAvailability { date, weekday, sessions });
        }
        Ok(days)
    }

    /// The template slot `key` refers to (by id or time range) among the
    /// finalized sessions in force on `date`.
    pub async fn find_bookable_slot(
        &self,
        doctor_id: Uuid,
        hospital_id: Uuid,
        date: NaiveDate,
        key: &str,
    ) -> Result<Option<Slot>, ScheduleError> {
        let Some(template) = self.template_for(doctor_id, hospital_id, date).await? else {
            return Ok(None);
        };

        let found = template
            .finalized_sessions()
            .flat_map(|s| s.slots.iter())
            .find(|slot| slot.matches(key))
            .cloned();
        Ok(found)
    }

    async fn resolve_pair(&self, doctor_ref: &str, hospital_ref: &str) -> Result<(Uuid, Uuid), ScheduleError> {
        let doctor = self.directory.require(ProviderKind::Doctor, doctor_ref).await?;
        let hospital = self.directory.require(ProviderKind::Hospital, hospital_ref).await?;
        Ok((doctor.id, hospital.id))
    }

    /// Fixed-date template first, recurring weekday template second. A fixed
    /// template without finalized sessions blocks the recurring one.
    async fn template_for(
        &self,
        doctor_id: Uuid,
        hospital_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<ScheduleTemplate>, ScheduleError> {
        if let Some(fixed) = self.templates.find(doctor_id, hospital_id, &CalendarKey::Date(date)).await? {
            return Ok(Some(fixed));
        }
        self.templates
            .find(doctor_id, hospital_id, &CalendarKey::Weekday(weekday_index(date)))
            .await
    }

    async fn resolve_ids(
        &self,
        doctor_id: Uuid,
        hospital_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<ResolvedSession>, ScheduleError> {
        let Some(template) = self.template_for(doctor_id, hospital_id, date).await? else {
            debug!("No template for doctor {} at hospital {} on {}", doctor_id, hospital_id, date);
            return Ok(Vec::new());
        };

        let booked: HashSet<String> = self
            .bookings
            .active_time_slots(doctor_id, hospital_id, date)
            .await?
            .into_iter()
            .collect();

        Ok(template
            .finalized_sessions()
            .map(|session| ResolvedSession {
                label: session.label.clone(),
                slots: session
                    .slots
                    .iter()
                    .map(|slot| ResolvedSlot {
                        slot: slot.clone(),
                        status: annotate(slot, &booked),
                    })
                    .collect(),
            })
            .collect())
    }
}

fn annotate(slot: &Slot, booked: &HashSet<String>) -> SlotStatus {
    if booked.iter().any(|key| slot.matches(key)) {
        return SlotStatus::Booked;
    }
    match slot.kind {
        SlotKind::Break => SlotStatus::Break,
        SlotKind::Emergency => SlotStatus::Emergency,
        SlotKind::Normal => SlotStatus::Available,
    }
}
