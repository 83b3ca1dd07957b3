use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub message: String,
    pub category: NotificationCategory,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: &str, message: &str, category: NotificationCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            message: message.to_string(),
            category,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// Marks the listed notifications read; an empty list marks the whole inbox.
#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    #[serde(default)]
    pub ids: Vec<Uuid>,
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification recipient is missing")]
    MissingRecipient,

    #[error("Notification store returned no row")]
    EmptyResponse,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::MissingRecipient => AppError::ValidationError(err.to_string()),
            NotificationError::EmptyResponse => AppError::Internal(err.to_string()),
            NotificationError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
