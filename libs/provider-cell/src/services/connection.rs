use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use notification_cell::{dispatch, NotificationCategory, Notifier, SupabaseNotifier};
use shared_config::AppConfig;

use crate::models::{
    ConnectionStatus, Provider, ProviderConnection, ProviderError, ProviderKind,
};
use crate::services::directory::ProviderDirectory;
use crate::store::{ConnectionStore, SupabaseConnectionStore};

/// Authorization relationship between doctors and hospitals. Every schedule
/// write and every booking for a pair goes through [`ConnectionGate::ensure_active`].
#[derive(Clone)]
pub struct ConnectionGate {
    directory: ProviderDirectory,
    connections: Arc<dyn ConnectionStore>,
    notifier: Arc<dyn Notifier>,
}

impl ConnectionGate {
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self {
            directory: ProviderDirectory::new(config, auth_token),
            connections: Arc::new(SupabaseConnectionStore::new(config, auth_token)),
            notifier: Arc::new(SupabaseNotifier::new(config, auth_token)),
        }
    }

    pub fn with_stores(
        directory: ProviderDirectory,
        connections: Arc<dyn ConnectionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { directory, connections, notifier }
    }

    pub fn directory(&self) -> &ProviderDirectory {
        &self.directory
    }

    /// Creates a pending connection towards the provider holding `target_code`.
    /// Re-requesting after a rejection resets the row to pending; pending and
    /// active rows are returned untouched.
    pub async fn request_connection(
        &self,
        initiator_kind: ProviderKind,
        initiator_ref: &str,
        target_code: &str,
    ) -> Result<ProviderConnection, ProviderError> {
        if target_code.trim().is_empty() {
            return Err(ProviderError::ValidationError("target code is required".to_string()));
        }

        let initiator = self.directory.require(initiator_kind, initiator_ref).await?;
        let target = self.directory.by_code(initiator_kind.counterpart(), target_code).await?;

        let (doctor, hospital) = match initiator_kind {
            ProviderKind::Doctor => (&initiator, &target),
            ProviderKind::Hospital => (&target, &initiator),
        };

        let connection = match self.connections.find_pair(doctor.id, hospital.id).await? {
            Some(existing) if existing.status == ConnectionStatus::Rejected => {
                info!("Re-requesting rejected connection {}", existing.id);
                self.connections.set_status(existing.id, ConnectionStatus::Pending).await?
            }
            Some(existing) => {
                debug!("Connection {} already {}", existing.id, existing.status);
                return Ok(existing);
            }
            None => {
                let fresh = ProviderConnection::new_pending(doctor.id, hospital.id, initiator_kind);
                match self.connections.insert(fresh).await {
                    Ok(created) => created,
                    // Lost a race against a concurrent request for the same pair.
                    Err(ProviderError::DuplicateConnection) => self
                        .connections
                        .find_pair(doctor.id, hospital.id)
                        .await?
                        .ok_or(ProviderError::ConnectionNotFound)?,
                    Err(e) => return Err(e),
                }
            }
        };

        info!(
            "Connection {} between doctor {} and hospital {} is {}",
            connection.id, doctor.id, hospital.id, connection.status
        );

        dispatch(
            self.notifier.clone(),
            target.owner_user_id.clone(),
            format!("{} requested a connection with you", label(&initiator)),
            NotificationCategory::Info,
        );

        Ok(connection)
    }

    /// Only the doctor side of a connection may accept or reject it.
    pub async fn confirm_connection(
        &self,
        doctor_ref: &str,
        connection_id: Uuid,
        new_status: ConnectionStatus,
    ) -> Result<ProviderConnection, ProviderError> {
        if new_status == ConnectionStatus::Pending {
            return Err(ProviderError::ValidationError(
                "connection can only be confirmed as active or rejected".to_string(),
            ));
        }

        let doctor = self.directory.require(ProviderKind::Doctor, doctor_ref).await?;
        let connection = self
            .connections
            .get(connection_id)
            .await?
            .ok_or(ProviderError::ConnectionNotFound)?;

        if connection.doctor_id != doctor.id {
            warn!("Doctor {} tried to confirm connection {} of another doctor", doctor.id, connection_id);
            return Err(ProviderError::Forbidden(
                "only the doctor of this connection may confirm it".to_string(),
            ));
        }

        if connection.status == new_status {
            return Ok(connection);
        }

        let updated = self.connections.set_status(connection_id, new_status).await?;
        info!("Connection {} is now {}", updated.id, updated.status);

        match self.directory.by_id(ProviderKind::Hospital, updated.hospital_id).await {
            Ok(hospital) => dispatch(
                self.notifier.clone(),
                hospital.owner_user_id,
                format!("{} marked your connection as {}", label(&doctor), updated.status),
                match updated.status {
                    ConnectionStatus::Active => NotificationCategory::Success,
                    _ => NotificationCategory::Warning,
                },
            ),
            Err(e) => warn!("Skipping connection notice, hospital lookup failed: {}", e),
        }

        Ok(updated)
    }

    /// Forbidden unless the pair has an `active` connection; the message
    /// carries the current status.
    pub async fn ensure_active(&self, doctor_id: Uuid, hospital_id: Uuid) -> Result<(), ProviderError> {
        match self.connections.find_pair(doctor_id, hospital_id).await? {
            Some(c) if c.status == ConnectionStatus::Active => Ok(()),
            Some(c) => Err(ProviderError::Forbidden(format!("connection is {}", c.status))),
            None => Err(ProviderError::Forbidden("no connection".to_string())),
        }
    }

    pub async fn list_connections(
        &self,
        kind: ProviderKind,
        actor_ref: &str,
    ) -> Result<Vec<ProviderConnection>, ProviderError> {
        let provider = self.directory.require(kind, actor_ref).await?;
        self.connections.list_for(kind, provider.id).await
    }
}

fn label(provider: &Provider) -> String {
    provider
        .display_name
        .clone()
        .unwrap_or_else(|| format!("{} {}", provider.kind, provider.unique_code))
}
