use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{Provider, ProviderError, ProviderKind, ProviderResolution};
use crate::store::{ProviderStore, SupabaseProviderStore};

/// Resolves the identifiers callers hand us (row id, owning user id or the
/// human readable code) to a canonical provider.
#[derive(Clone)]
pub struct ProviderDirectory {
    store: Arc<dyn ProviderStore>,
}

impl ProviderDirectory {
    pub fn new(config: &AppConfig, auth_token: Option<&str>) -> Self {
        Self::with_store(Arc::new(SupabaseProviderStore::new(config, auth_token)))
    }

    pub fn with_store(store: Arc<dyn ProviderStore>) -> Self {
        Self { store }
    }

    /// Lookup order is fixed: primary key, then owning user, then unique code.
    /// The primary key step only runs for references that parse as a UUID.
    pub async fn resolve(&self, kind: ProviderKind, reference: &str) -> Result<ProviderResolution, ProviderError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Ok(ProviderResolution::NotFound);
        }

        if let Ok(id) = Uuid::parse_str(reference) {
            if let Some(provider) = self.store.find_by_id(kind, id).await? {
                return Ok(ProviderResolution::ByPrimaryKey(provider));
            }
        }

        if let Some(provider) = self.store.find_by_owner(kind, reference).await? {
            return Ok(ProviderResolution::ByOwner(provider));
        }

        if let Some(provider) = self.store.find_by_code(kind, reference).await? {
            return Ok(ProviderResolution::ByCode(provider));
        }

        debug!("No {} matches reference {}", kind, reference);
        Ok(ProviderResolution::NotFound)
    }

    pub async fn require(&self, kind: ProviderKind, reference: &str) -> Result<Provider, ProviderError> {
        self.resolve(kind, reference)
            .await?
            .into_provider()
            .ok_or_else(|| ProviderError::NotFound {
                kind,
                reference: reference.to_string(),
            })
    }

    /// Doctor first, then hospital, when the caller does not say which.
    pub async fn resolve_any(&self, kind: Option<ProviderKind>, reference: &str) -> Result<ProviderResolution, ProviderError> {
        let kinds = match kind {
            Some(k) => vec![k],
            None => vec![ProviderKind::Doctor, ProviderKind::Hospital],
        };

        for kind in kinds {
            let resolution = self.resolve(kind, reference).await?;
            if resolution != ProviderResolution::NotFound {
                return Ok(resolution);
            }
        }
        Ok(ProviderResolution::NotFound)
    }

    pub async fn by_id(&self, kind: ProviderKind, id: Uuid) -> Result<Provider, ProviderError> {
        self.store
            .find_by_id(kind, id)
            .await?
            .ok_or_else(|| ProviderError::NotFound {
                kind,
                reference: id.to_string(),
            })
    }

    pub async fn by_code(&self, kind: ProviderKind, code: &str) -> Result<Provider, ProviderError> {
        self.store
            .find_by_code(kind, code.trim())
            .await?
            .ok_or_else(|| ProviderError::NotFound {
                kind,
                reference: code.to_string(),
            })
    }
}
