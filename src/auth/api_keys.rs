//! API key generation, hashing and validation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use surrealdb::sql::Datetime;
use tracing::debug;
use uuid::Uuid;

use crate::auth::identity::CredentialInfo;
use crate::auth::store::ApiKeyStore;
use crate::db::{Db, QueryBuilder};
use crate::types::{ApiKeyHash, ApiKeyPrefix};

/// Display name of the key configured through the environment.
pub const STATIC_KEY_NAME: &str = "Static API Key";

/// Prefix of every generated key.
pub const KEY_PREFIX: &str = "pp_";

/// Hash an API key for storage/lookup.
pub fn hash_api_key(key: &str) -> ApiKeyHash {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    ApiKeyHash::new(format!("{:x}", hasher.finalize()))
}

/// Generate a new API key of the form `pp_<8 hex>_<32 hex>`.
/// Returns (full_key, prefix, hash)
pub fn generate_api_key() -> (String, ApiKeyPrefix, ApiKeyHash) {
    let prefix = ApiKeyPrefix::new(format!("{}{}", KEY_PREFIX, &Uuid::new_v4().simple().to_string()[..8]));
    let secret = Uuid::new_v4().simple().to_string();
    let full_key = format!("{}_{}", prefix, secret);
    let key_hash = hash_api_key(&full_key);

    (full_key, prefix, key_hash)
}

/// Validates keys against the optional static key, then the database.
pub struct ApiKeyRegistry {
    db: Db,
    static_key_hash: Option<ApiKeyHash>,
}

impl ApiKeyRegistry {
    pub fn new(db: Db, static_key: Option<String>) -> Self {
        let static_key_hash = static_key
            .filter(|k| !k.trim().is_empty())
            .map(|k| hash_api_key(&k));
        Self { db, static_key_hash }
    }

    pub fn has_static_key(&self) -> bool {
        self.static_key_hash.is_some()
    }
}

#[async_trait]
impl ApiKeyStore for ApiKeyRegistry {
    async fn validate_api_key(&self, key: &str) -> Result<Option<CredentialInfo>> {
        let key_hash = hash_api_key(key);

        // Compare digests so the static key check does not leak its length.
        if self.static_key_hash.as_ref() == Some(&key_hash) {
            return Ok(Some(CredentialInfo {
                name: STATIC_KEY_NAME.to_string(),
                key_prefix: None,
                scopes: Vec::new(),
            }));
        }

        let now = Datetime::from(Utc::now());
        let Some(record) = QueryBuilder::find_usable_api_key(&self.db, key_hash.as_str(), now).await? else {
            return Ok(None);
        };

        QueryBuilder::update_api_key_last_used(&self.db, &record.id).await?;
        debug!(key_prefix = %record.key_prefix, "API key accepted");

        let name = record
            .name
            .unwrap_or_else(|| format!("API Key {}", record.key_prefix));

        Ok(Some(CredentialInfo {
            name,
            key_prefix: Some(record.key_prefix),
            scopes: record.scopes.unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_connection, ensure_schema, ApiKeyCreate, DatabaseConfig};

    async fn setup_test_db() -> Db {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        db
    }

    async fn store_key(db: &Db, name: Option<&str>, expires_at: Option<Datetime>) -> (String, ApiKeyPrefix) {
        let (full_key, prefix, key_hash) = generate_api_key();
        QueryBuilder::create_api_key(db, &ApiKeyCreate {
            key_hash,
            key_prefix: prefix.clone(),
            user_id: None,
            name: name.map(String::from),
            expires_at,
            scopes: Some(vec!["recipes".to_string()]),
        })
        .await
        .unwrap();
        (full_key, prefix)
    }

    #[test]
    fn test_hash_api_key() {
        let hash1 = hash_api_key("test_key");
        let hash2 = hash_api_key("test_key");
        let hash3 = hash_api_key("different_key");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.as_str().len(), 64);
    }

    #[test]
    fn test_generate_api_key_format() {
        let (key, prefix, hash) = generate_api_key();

        assert!(key.starts_with(prefix.as_str()));
        assert_eq!(prefix.as_str().len(), 11);
        let secret = key.strip_prefix(&format!("{}_", prefix)).unwrap();
        assert_eq!(secret.len(), 32);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash_api_key(&key), hash);
    }

    #[tokio::test]
    async fn test_static_key() {
        let registry = ApiKeyRegistry::new(setup_test_db().await, Some("s3cret".into()));
        assert!(registry.has_static_key());

        let info = registry.validate_api_key("s3cret").await.unwrap().unwrap();
        assert_eq!(info.name, STATIC_KEY_NAME);
        assert!(info.key_prefix.is_none());

        assert!(registry.validate_api_key("s3cre").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_static_key_is_ignored() {
        let registry = ApiKeyRegistry::new(setup_test_db().await, Some("  ".into()));
        assert!(!registry.has_static_key());
        assert!(registry.validate_api_key("  ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_database_key() {
        let db = setup_test_db().await;
        let (key, prefix) = store_key(&db, None, None).await;
        let registry = ApiKeyRegistry::new(db.clone(), None);

        let info = registry.validate_api_key(&key).await.unwrap().unwrap();
        assert_eq!(info.name, format!("API Key {}", prefix));
        assert_eq!(info.key_prefix, Some(prefix.clone()));
        assert_eq!(info.scopes, vec!["recipes".to_string()]);

        let record = QueryBuilder::find_api_key_by_hash(&db, hash_api_key(&key).as_str())
            .await
            .unwrap()
            .unwrap();
        assert!(record.last_used_at.is_some());

        QueryBuilder::deactivate_api_key_by_prefix(&db, prefix.as_str()).await.unwrap();
        assert!(registry.validate_api_key(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_database_key() {
        let db = setup_test_db().await;
        let past = Datetime::from(Utc::now() - chrono::Duration::minutes(1));
        let (key, _) = store_key(&db, Some("old"), Some(past)).await;
        let registry = ApiKeyRegistry::new(db, None);

        assert!(registry.validate_api_key(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_named_key_and_unknown_key() {
        let db = setup_test_db().await;
        let (key, _) = store_key(&db, Some("Inventory sync"), None).await;
        let registry = ApiKeyRegistry::new(db, Some("static".into()));

        assert_eq!(registry.validate_api_key(&key).await.unwrap().unwrap().name, "Inventory sync");
        assert!(registry.validate_api_key("pp_00000000_nope").await.unwrap().is_none());
    }
}
