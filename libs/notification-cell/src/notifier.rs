use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, RETURN_REPRESENTATION};

use crate::models::{Notification, NotificationCategory, NotificationError};

/// Delivery side of the notification inbox.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        user_id: &str,
        message: &str,
        category: NotificationCategory,
    ) -> Result<Notification, NotificationError>;

    async fn list_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, NotificationError>;

    /// Returns how many notifications changed state.
    async fn mark_read(&self, user_id: &str, ids: &[Uuid]) -> Result<usize, NotificationError>;
}

/// Sends a notification without holding up the caller. Failures are logged
/// and dropped; the request that triggered the notification has already
/// committed by the time this runs.
pub fn dispatch(
    notifier: Arc<dyn Notifier>,
    user_id: String,
    message: String,
    category: NotificationCategory,
) {
    tokio::spawn(async move {
        match notifier.notify(&user_id, &message, category).await {
            Ok(sent) => debug!("Notification {} delivered to {}", sent.id, user_id),
            Err(e) => warn!("Failed to notify {}: {}", user_id, e),
        }
    });
}

pub struct SupabaseNotifier {
    supabase: SupabaseClient,
    auth_token: Option<String>,
}

impl SupabaseNotifier {
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            auth_token: auth_token.map(str::to_string),
        }
    }
}

#[async_trait]
impl Notifier for SupabaseNotifier {
    async fn notify(
        &self,
        user_id: &str,
        message: &str,
        category: NotificationCategory,
    ) -> Result<Notification, NotificationError> {
        if user_id.trim().is_empty() {
            return Err(NotificationError::MissingRecipient);
        }

        let notification = Notification::new(user_id, message, category);
        let body = serde_json::to_value(&notification)
            .map_err(|e| NotificationError::Database(e.into()))?;

        let rows = self
            .supabase
            .write_returning(
                Method::POST,
                "/rest/v1/notifications",
                self.auth_token.as_deref(),
                body,
                RETURN_REPRESENTATION,
            )
            .await?;

        let row = rows.into_iter().next().ok_or(NotificationError::EmptyResponse)?;
        serde_json::from_value(row).map_err(|e| NotificationError::Database(e.into()))
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, NotificationError> {
        let mut path = format!(
            "/rest/v1/notifications?user_id=eq.{}&order=created_at.desc",
            urlencoding::encode(user_id)
        );
        if unread_only {
            path.push_str("&is_read=eq.false");
        }

        let notifications: Vec<Notification> = self
            .supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await?;
        Ok(notifications)
    }

    async fn mark_read(&self, user_id: &str, ids: &[Uuid]) -> Result<usize, NotificationError> {
        let mut path = format!(
            "/rest/v1/notifications?user_id=eq.{}&is_read=eq.false",
            urlencoding::encode(user_id)
        );
        if !ids.is_empty() {
            let list = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
            path.push_str(&format!("&id=in.({})", list));
        }

        let rows = self
            .supabase
            .write_returning(
                Method::PATCH,
                &path,
                self.auth_token.as_deref(),
                json!({ "is_read": true }),
                RETURN_REPRESENTATION,
            )
            .await?;
        Ok(rows.len())
    }
}

/// Process-local inbox for tests and embedders.
#[derive(Default)]
pub struct InMemoryNotifier {
    sent: RwLock<Vec<Notification>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(
        &self,
        user_id: &str,
        message: &str,
        category: NotificationCategory,
    ) -> Result<Notification, NotificationError> {
        if user_id.trim().is_empty() {
            return Err(NotificationError::MissingRecipient);
        }

        let notification = Notification::new(user_id, message, category);
        self.sent.write().await.push(notification.clone());
        Ok(notification)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, NotificationError> {
        let mut found: Vec<Notification> = self
            .sent
            .read()
            .await
            .iter()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn mark_read(&self, user_id: &str, ids: &[Uuid]) -> Result<usize, NotificationError> {
        let mut sent = self.sent.write().await;
        let mut changed = 0;
        for n in sent
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .filter(|n| ids.is_empty() || ids.contains(&n.id))
        {
            n.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_inbox_marks_read_per_user() {
        let notifier = InMemoryNotifier::new();
        let first = notifier.notify("u1", "booked", NotificationCategory::Info).await.unwrap();
        notifier.notify("u1", "approved", NotificationCategory::Success).await.unwrap();
        notifier.notify("u2", "other", NotificationCategory::Info).await.unwrap();

        assert_eq!(notifier.mark_read("u1", &[first.id]).await.unwrap(), 1);
        assert_eq!(notifier.list_for_user("u1", true).await.unwrap().len(), 1);
        assert_eq!(notifier.mark_read("u1", &[]).await.unwrap(), 1);
        assert!(notifier.list_for_user("u1", true).await.unwrap().is_empty());
        assert_eq!(notifier.list_for_user("u2", true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_recipient_is_rejected() {
        let notifier = InMemoryNotifier::new();
        let err = notifier.notify(" ", "x", NotificationCategory::Info).await.unwrap_err();
        assert!(matches!(err, NotificationError::MissingRecipient));
    }
}
