use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Platform role of the caller. Supabase puts `authenticated` in the
    /// top-level `role` claim, so `user_metadata.role` is consulted first.
    pub fn actor_role(&self) -> Option<ActorRole> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("role"))
            .and_then(serde_json::Value::as_str)
            .and_then(ActorRole::parse)
            .or_else(|| self.role.as_deref().and_then(ActorRole::parse))
    }
}

/// The parties that act on the scheduling platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Patient,
    Doctor,
    Hospital,
    Admin,
}

impl ActorRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "patient" => Some(ActorRole::Patient),
            "doctor" => Some(ActorRole::Doctor),
            "hospital" => Some(ActorRole::Hospital),
            "admin" => Some(ActorRole::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Patient => write!(f, "patient"),
            ActorRole::Doctor => write!(f, "doctor"),
            ActorRole::Hospital => write!(f, "hospital"),
            ActorRole::Admin => write!(f, "admin"),
        }
    }
}
