use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use provider_cell::ProviderError;
use shared_database::DatabaseError;
use shared_models::error::AppError;

/// Weekday index used across the platform: 0 = Monday ... 6 = Sunday.
pub type WeekdayIndex = u8;

pub const SATURDAY: WeekdayIndex = 5;

/// Upper bound on days resolved by one availability range query.
pub const MAX_RANGE_DAYS: u32 = 60;

pub fn weekday_index(date: NaiveDate) -> WeekdayIndex {
    date.weekday().num_days_from_monday() as WeekdayIndex
}

// ==============================================================================
// SLOTS
// ==============================================================================

static TIME_RANGE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2}):(\d{2})\s*-\s*(\d{1,2}):(\d{2})\s*$").ok()
});

/// A parsed `"HH:MM - HH:MM"` range with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn parse(raw: &str) -> Result<Self, ScheduleError> {
        let invalid = || ScheduleError::ValidationError(format!("invalid time range: {:?}", raw));

        let caps = TIME_RANGE.as_ref().and_then(|re| re.captures(raw)).ok_or_else(invalid)?;
        let num = |i: usize| caps[i].parse::<u32>().map_err(|_| invalid());

        let start = NaiveTime::from_hms_opt(num(1)?, num(2)?, 0).ok_or_else(invalid)?;
        let end = NaiveTime::from_hms_opt(num(3)?, num(4)?, 0).ok_or_else(invalid)?;

        if start >= end {
            return Err(ScheduleError::ValidationError(format!(
                "time range must start before it ends: {:?}",
                raw
            )));
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    #[default]
    Normal,
    Break,
    #[serde(alias = "emergency_reserved")]
    Emergency,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub slot_id: String,
    pub display_time_range: String,
    #[serde(default)]
    pub kind: SlotKind,
}

impl Slot {
    /// True when `key` names this slot either by id or by its time range.
    /// Time ranges compare after normalisation, so `"9:00-9:10"` matches `"09:00 - 09:10"`.
    pub fn matches(&self, key: &str) -> bool {
        let key = key.trim();
        if key == self.slot_id || key == self.display_time_range {
            return true;
        }
        match (TimeRange::parse(key), TimeRange::parse(&self.display_time_range)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub label: String,
    #[serde(default)]
    pub is_finalized: bool,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

impl Session {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.label.trim().is_empty() {
            return Err(ScheduleError::ValidationError("session label is required".to_string()));
        }

        let mut ids = HashSet::new();
        let mut ranges = HashSet::new();
        for slot in &self.slots {
            if slot.slot_id.trim().is_empty() {
                return Err(ScheduleError::ValidationError(format!(
                    "slot without id in session {:?}",
                    self.label
                )));
            }
            if !ids.insert(slot.slot_id.as_str()) {
                return Err(ScheduleError::ValidationError(format!(
                    "duplicate slot id {:?} in session {:?}",
                    slot.slot_id, self.label
                )));
            }
            let range = TimeRange::parse(&slot.display_time_range)?;
            if !ranges.insert(range.to_string()) {
                return Err(ScheduleError::ValidationError(format!(
                    "duplicate time range {:?} in session {:?}",
                    slot.display_time_range, self.label
                )));
            }
        }
        Ok(())
    }
}

// ==============================================================================
// CALENDAR KEYS & TEMPLATES
// ==============================================================================

/// Which day(s) a template applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CalendarKeyRepr", into = "CalendarKeyRepr")]
pub enum CalendarKey {
    Date(NaiveDate),
    Weekday(WeekdayIndex),
}

#[derive(Debug, Serialize, Deserialize)]
struct CalendarKeyRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weekday: Option<WeekdayIndex>,
}

impl TryFrom<CalendarKeyRepr> for CalendarKey {
    type Error = String;

    fn try_from(repr: CalendarKeyRepr) -> Result<Self, Self::Error> {
        match (repr.is_recurring, repr.date, repr.weekday) {
            (true, _, Some(weekday)) => Ok(CalendarKey::Weekday(weekday)),
            (true, _, None) => Err("recurring calendar key needs a weekday".to_string()),
            (false, Some(date), _) => Ok(CalendarKey::Date(date)),
            (false, None, _) => Err("calendar key needs a date or is_recurring with a weekday".to_string()),
        }
    }
}

impl From<CalendarKey> for CalendarKeyRepr {
    fn from(key: CalendarKey) -> Self {
        match key {
            CalendarKey::Date(date) => CalendarKeyRepr { date: Some(date), is_recurring: false, weekday: None },
            CalendarKey::Weekday(weekday) => CalendarKeyRepr { date: None, is_recurring: true, weekday: Some(weekday) },
        }
    }
}

impl CalendarKey {
    /// Single-column form persisted in `schedule_templates.calendar_key`.
    pub fn storage_key(&self) -> String {
        match self {
            CalendarKey::Date(date) => date.format("%Y-%m-%d").to_string(),
            CalendarKey::Weekday(weekday) => format!("weekday:{}", weekday),
        }
    }

    pub fn from_storage_key(raw: &str) -> Result<Self, ScheduleError> {
        if let Some(day) = raw.strip_prefix("weekday:") {
            return day
                .parse()
                .map(CalendarKey::Weekday)
                .map_err(|_| ScheduleError::ValidationError(format!("bad calendar key {:?}", raw)));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(CalendarKey::Date)
            .map_err(|_| ScheduleError::ValidationError(format!("bad calendar key {:?}", raw)))
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        match *self {
            CalendarKey::Weekday(day) if day > 6 => Err(ScheduleError::ValidationError(format!(
                "weekday must be between 0 (Monday) and 6 (Sunday), got {}",
                day
            ))),
            CalendarKey::Weekday(SATURDAY) => Err(ScheduleError::ValidationError(
                "no Saturday scheduling for recurring templates".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleTemplate {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub hospital_id: Uuid,
    pub calendar_key: CalendarKey,
    pub sessions: Vec<Session>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleTemplate {
    pub fn new(doctor_id: Uuid, hospital_id: Uuid, calendar_key: CalendarKey, sessions: Vec<Session>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            hospital_id,
            calendar_key,
            sessions,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn finalized_sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter().filter(|s| s.is_finalized)
    }
}

/// Checks every session, then that slot ids are unique across the whole
/// template. Time ranges may repeat in different sessions.
pub fn validate_sessions(sessions: &[Session]) -> Result<(), ScheduleError> {
    let mut ids = HashSet::new();
    for session in sessions {
        session.validate()?;
        for slot in &session.slots {
            if !ids.insert(slot.slot_id.as_str()) {
                return Err(ScheduleError::ValidationError(format!(
                    "slot id {:?} is used by more than one session",
                    slot.slot_id
                )));
            }
        }
    }
    Ok(())
}

/// Row as stored in `schedule_templates`; sessions live in a jsonb column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRow {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub hospital_id: Uuid,
    pub calendar_key: String,
    pub sessions: Vec<Session>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for ScheduleTemplate {
    type Error = ScheduleError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            doctor_id: row.doctor_id,
            hospital_id: row.hospital_id,
            calendar_key: CalendarKey::from_storage_key(&row.calendar_key)?,
            sessions: row.sessions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    pub doctor_id: Option<Uuid>,
    pub hospital_id: Option<Uuid>,
    pub calendar_key: Option<CalendarKey>,
}

// ==============================================================================
// RESOLVED AVAILABILITY
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
    Break,
    Emergency,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedSlot {
    #[serde(flatten)]
    pub slot: Slot,
    pub status: SlotStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedSession {
    pub label: String,
    pub slots: Vec<ResolvedSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub weekday: WeekdayIndex,
    pub sessions: Vec<ResolvedSession>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct UpsertTemplateRequest {
    pub doctor_id: String,
    pub hospital_id: String,
    pub calendar_key: CalendarKey,
    pub sessions: Vec<Session>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    pub doctor_id: Option<String>,
    pub hospital_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub weekday: Option<WeekdayIndex>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRangeQuery {
    pub start_date: Option<NaiveDate>,
    pub days: Option<u32>,
    pub skip_weekday: Option<WeekdayIndex>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::ValidationError(msg) => AppError::ValidationError(msg),
            ScheduleError::Forbidden(msg) => AppError::Forbidden(msg),
            ScheduleError::Provider(e) => e.into(),
            ScheduleError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
