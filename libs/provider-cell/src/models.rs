use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::auth::ActorRole;
use shared_models::error::AppError;

// ==============================================================================
// PROVIDERS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Doctor,
    Hospital,
}

impl ProviderKind {
    pub fn table(&self) -> &'static str {
        match self {
            ProviderKind::Doctor => "doctors",
            ProviderKind::Hospital => "hospitals",
        }
    }

    /// The party on the other side of a doctor/hospital connection.
    pub fn counterpart(&self) -> ProviderKind {
        match self {
            ProviderKind::Doctor => ProviderKind::Hospital,
            ProviderKind::Hospital => ProviderKind::Doctor,
        }
    }

    pub fn from_role(role: ActorRole) -> Option<ProviderKind> {
        match role {
            ActorRole::Doctor => Some(ProviderKind::Doctor),
            ActorRole::Hospital => Some(ProviderKind::Hospital),
            ActorRole::Patient | ActorRole::Admin => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Doctor => write!(f, "doctor"),
            ProviderKind::Hospital => write!(f, "hospital"),
        }
    }
}

/// Canonical doctor or hospital record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provider {
    pub id: Uuid,
    pub owner_user_id: String,
    pub unique_code: String,
    pub kind: ProviderKind,
    pub display_name: Option<String>,
}

/// Row shape shared by the `doctors` and `hospitals` tables.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderRow {
    pub id: Uuid,
    pub user_id: String,
    pub unique_code: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ProviderRow {
    pub fn into_provider(self, kind: ProviderKind) -> Provider {
        Provider {
            id: self.id,
            owner_user_id: self.user_id,
            unique_code: self.unique_code,
            kind,
            display_name: self.full_name.or(self.name),
        }
    }
}

/// Outcome of the primary key → owning user → unique code lookup chain.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "matched_by", content = "provider", rename_all = "snake_case")]
pub enum ProviderResolution {
    ByPrimaryKey(Provider),
    ByOwner(Provider),
    ByCode(Provider),
    NotFound,
}

impl ProviderResolution {
    pub fn provider(&self) -> Option<&Provider> {
        match self {
            ProviderResolution::ByPrimaryKey(p)
            | ProviderResolution::ByOwner(p)
            | ProviderResolution::ByCode(p) => Some(p),
            ProviderResolution::NotFound => None,
        }
    }

    pub fn into_provider(self) -> Option<Provider> {
        match self {
            ProviderResolution::ByPrimaryKey(p)
            | ProviderResolution::ByOwner(p)
            | ProviderResolution::ByCode(p) => Some(p),
            ProviderResolution::NotFound => None,
        }
    }
}

// ==============================================================================
// CONNECTIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Pending,
    Active,
    Rejected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Pending => write!(f, "pending"),
            ConnectionStatus::Active => write!(f, "active"),
            ConnectionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConnection {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub hospital_id: Uuid,
    pub status: ConnectionStatus,
    pub initiated_by: ProviderKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProviderConnection {
    pub fn new_pending(doctor_id: Uuid, hospital_id: Uuid, initiated_by: ProviderKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            hospital_id,
            status: ConnectionStatus::Pending,
            initiated_by,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub target_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmConnectionRequest {
    pub connection_id: Uuid,
    pub status: ConnectionStatus,
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub kind: Option<ProviderKind>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{kind} not found: {reference}")]
    NotFound { kind: ProviderKind, reference: String },

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Connection already exists for this doctor and hospital")]
    DuplicateConnection,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound { .. } | ProviderError::ConnectionNotFound => {
                AppError::NotFound(err.to_string())
            }
            ProviderError::Forbidden(msg) => AppError::Forbidden(msg),
            ProviderError::ValidationError(msg) => AppError::ValidationError(msg),
            ProviderError::DuplicateConnection => AppError::Conflict(err.to_string()),
            ProviderError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
