use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, RETURN_REPRESENTATION};

use crate::models::{
    ConnectionStatus, Provider, ProviderConnection, ProviderError, ProviderKind, ProviderRow,
};

#[async_trait]
pub trait ProviderStore: Send + Sync {
    async fn find_by_id(&self, kind: ProviderKind, id: Uuid) -> Result<Option<Provider>, ProviderError>;

    async fn find_by_owner(&self, kind: ProviderKind, user_id: &str) -> Result<Option<Provider>, ProviderError>;

    async fn find_by_code(&self, kind: ProviderKind, code: &str) -> Result<Option<Provider>, ProviderError>;
}

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn find_pair(&self, doctor_id: Uuid, hospital_id: Uuid) -> Result<Option<ProviderConnection>, ProviderError>;

    async fn get(&self, id: Uuid) -> Result<Option<ProviderConnection>, ProviderError>;

    /// Fails with [`ProviderError::DuplicateConnection`] when the pair already has a row.
    async fn insert(&self, connection: ProviderConnection) -> Result<ProviderConnection, ProviderError>;

    async fn set_status(&self, id: Uuid, status: ConnectionStatus) -> Result<ProviderConnection, ProviderError>;

    async fn list_for(&self, kind: ProviderKind, provider_id: Uuid) -> Result<Vec<ProviderConnection>, ProviderError>;
}

// ==============================================================================
// SUPABASE
// ==============================================================================

pub struct SupabaseProviderStore {
    supabase: SupabaseClient,
    auth_token: Option<String>,
}

impl SupabaseProviderStore {
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            auth_token: auth_token.map(str::to_string),
        }
    }

    async fn find_one(&self, kind: ProviderKind, column: &str, value: &str) -> Result<Option<Provider>, ProviderError> {
        let path = format!(
            "/rest/v1/{}?{}=eq.{}&limit=1",
            kind.table(),
            column,
            urlencoding::encode(value)
        );

        let rows: Vec<ProviderRow> = self
            .supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await?;

        Ok(rows.into_iter().next().map(|row| row.into_provider(kind)))
    }
}

#[async_trait]
impl ProviderStore for SupabaseProviderStore {
    async fn find_by_id(&self, kind: ProviderKind, id: Uuid) -> Result<Option<Provider>, ProviderError> {
        self.find_one(kind, "id", &id.to_string()).await
    }

    async fn find_by_owner(&self, kind: ProviderKind, user_id: &str) -> Result<Option<Provider>, ProviderError> {
        self.find_one(kind, "user_id", user_id).await
    }

    async fn find_by_code(&self, kind: ProviderKind, code: &str) -> Result<Option<Provider>, ProviderError> {
        self.find_one(kind, "unique_code", code).await
    }
}

pub struct SupabaseConnectionStore {
    supabase: SupabaseClient,
    auth_token: Option<String>,
}

impl SupabaseConnectionStore {
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            auth_token: auth_token.map(str::to_string),
        }
    }

    async fn select(&self, filter: &str) -> Result<Vec<ProviderConnection>, ProviderError> {
        let path = format!("/rest/v1/provider_connections?{}", filter);
        let rows: Vec<ProviderConnection> = self
            .supabase
            .request(Method::GET, &path, self.auth_token.as_deref(), None)
            .await?;
        Ok(rows)
    }
}

fn first_row(rows: Vec<serde_json::Value>) -> Result<ProviderConnection, ProviderError> {
    let row = rows.into_iter().next().ok_or(ProviderError::ConnectionNotFound)?;
    serde_json::from_value(row).map_err(|e| ProviderError::Database(e.into()))
}

#[async_trait]
impl ConnectionStore for SupabaseConnectionStore {
    async fn find_pair(&self, doctor_id: Uuid, hospital_id: Uuid) -> Result<Option<ProviderConnection>, ProviderError> {
        let rows = self
            .select(&format!("doctor_id=eq.{}&hospital_id=eq.{}&limit=1", doctor_id, hospital_id))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProviderConnection>, ProviderError> {
        let rows = self.select(&format!("id=eq.{}&limit=1", id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, connection: ProviderConnection) -> Result<ProviderConnection, ProviderError> {
        let body = serde_json::to_value(&connection).map_err(|e| ProviderError::Database(e.into()))?;

        let rows = self
            .supabase
            .write_returning(
                Method::POST,
                "/rest/v1/provider_connections",
                self.auth_token.as_deref(),
                body,
                RETURN_REPRESENTATION,
            )
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    ProviderError::DuplicateConnection
                } else {
                    ProviderError::Database(e)
                }
            })?;

        first_row(rows)
    }

    async fn set_status(&self, id: Uuid, status: ConnectionStatus) -> Result<ProviderConnection, ProviderError> {
        let rows = self
            .supabase
            .write_returning(
                Method::PATCH,
                &format!("/rest/v1/provider_connections?id=eq.{}", id),
                self.auth_token.as_deref(),
                json!({ "status": status, "updated_at": Utc::now() }),
                RETURN_REPRESENTATION,
            )
            .await?;

        first_row(rows)
    }

    async fn list_for(&self, kind: ProviderKind, provider_id: Uuid) -> Result<Vec<ProviderConnection>, ProviderError> {
        let column = match kind {
            ProviderKind::Doctor => "doctor_id",
            ProviderKind::Hospital => "hospital_id",
        };
        self.select(&format!("{}=eq.{}&order=created_at.desc", column, provider_id)).await
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryProviderStore {
    providers: RwLock<Vec<Provider>>,
}

impl InMemoryProviderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, provider: Provider) {
        self.providers.write().await.push(provider);
    }

    async fn find(&self, kind: ProviderKind, pred: impl Fn(&Provider) -> bool) -> Option<Provider> {
        self.providers
            .read()
            .await
            .iter()
            .find(|p| p.kind == kind && pred(p))
            .cloned()
    }
}

#[async_trait]
impl ProviderStore for InMemoryProviderStore {
    async fn find_by_id(&self, kind: ProviderKind, id: Uuid) -> Result<Option<Provider>, ProviderError> {
        Ok(self.find(kind, |p| p.id == id).await)
    }

    async fn find_by_owner(&self, kind: ProviderKind, user_id: &str) -> Result<Option<Provider>, ProviderError> {
        Ok(self.find(kind, |p| p.owner_user_id == user_id).await)
    }

    async fn find_by_code(&self, kind: ProviderKind, code: &str) -> Result<Option<Provider>, ProviderError> {
        Ok(self.find(kind, |p| p.unique_code == code).await)
    }
}

#[derive(Default)]
pub struct InMemoryConnectionStore {
    connections: RwLock<Vec<ProviderConnection>>,
}

impl InMemoryConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn find_pair(&self, doctor_id: Uuid, hospital_id: Uuid) -> Result<Option<ProviderConnection>, ProviderError> {
        Ok(self
            .connections
            .read()
            .await
            .iter()
            .find(|c| c.doctor_id == doctor_id && c.hospital_id == hospital_id)
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProviderConnection>, ProviderError> {
        Ok(self.connections.read().await.iter().find(|c| c.id == id).cloned())
    }

    async fn insert(&self, connection: ProviderConnection) -> Result<ProviderConnection, ProviderError> {
        let mut connections = self.connections.write().await;
        if connections
            .iter()
            .any(|c| c.doctor_id == connection.doctor_id && c.hospital_id == connection.hospital_id)
        {
            return Err(ProviderError::DuplicateConnection);
        }
        connections.push(connection.clone());
        Ok(connection)
    }

    async fn set_status(&self, id: Uuid, status: ConnectionStatus) -> Result<ProviderConnection, ProviderError> {
        let mut connections = self.connections.write().await;
        let connection = connections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(ProviderError::ConnectionNotFound)?;
        connection.status = status;
        connection.updated_at = Utc::now();
        Ok(connection.clone())
    }

    async fn list_for(&self, kind: ProviderKind, provider_id: Uuid) -> Result<Vec<ProviderConnection>, ProviderError> {
        let mut found: Vec<ProviderConnection> = self
            .connections
            .read()
            .await
            .iter()
            .filter(|c| match kind {
                ProviderKind::Doctor => c.doctor_id == provider_id,
                ProviderKind::Hospital => c.hospital_id == provider_id,
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}
