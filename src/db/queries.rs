// Database query helpers for API keys.
//
// Users and sessions live behind `UserStore`; API keys are managed from the
// CLI and looked up by the key registry, so they get plain helpers here.

use crate::db::schema::*;
use anyhow::{anyhow, Result};
use surrealdb::RecordId;
use surrealdb::sql::Datetime;
use surrealdb::{engine::any::Any, Surreal};

pub struct QueryBuilder;

impl QueryBuilder {
    /// Insert a new API key record.
    pub async fn create_api_key(db: &Surreal<Any>, data: &ApiKeyCreate) -> Result<ApiKeyRecord> {
        let mut res = db
            .query(
                r#"
                CREATE api_key CONTENT {
                    key_hash: $key_hash,
                    key_prefix: $key_prefix,
                    user_id: $user_id,
                    name: $name,
                    is_active: true,
                    expires_at: $expires_at,
                    scopes: $scopes
                }
                "#,
            )
            .bind(("key_hash", data.key_hash.clone()))
            .bind(("key_prefix", data.key_prefix.clone()))
            .bind(("user_id", data.user_id.clone()))
            .bind(("name", data.name.clone()))
            .bind(("expires_at", data.expires_at.clone()))
            .bind(("scopes", data.scopes.clone()))
            .await?;

        let created: Option<ApiKeyRecord> = res.take(0)?;
        created.ok_or_else(|| anyhow!("failed to create api key record"))
    }

    /// Look up a key by hash regardless of its state.
    pub async fn find_api_key_by_hash(
        db: &Surreal<Any>,
        key_hash: &str,
    ) -> Result<Option<ApiKeyRecord>> {
        let mut res = db
            .query("SELECT * FROM api_key WHERE key_hash = $key_hash LIMIT 1")
            .bind(("key_hash", key_hash.to_string()))
            .await?;

        let keys: Vec<ApiKeyRecord> = res.take(0)?;
        Ok(keys.into_iter().next())
    }

    /// Look up a key by hash, only if it is active and unexpired at `now`.
    pub async fn find_usable_api_key(
        db: &Surreal<Any>,
        key_hash: &str,
        now: Datetime,
    ) -> Result<Option<ApiKeyRecord>> {
        let mut res = db
            .query(
                r#"
                SELECT * FROM api_key
                WHERE key_hash = $key_hash
                  AND is_active = true
                  AND (expires_at = NONE OR expires_at > $now)
                LIMIT 1
                "#,
            )
            .bind(("key_hash", key_hash.to_string()))
            .bind(("now", now))
            .await?;

        let keys: Vec<ApiKeyRecord> = res.take(0)?;
        Ok(keys.into_iter().next())
    }

    pub async fn update_api_key_last_used(db: &Surreal<Any>, id: &RecordId) -> Result<()> {
        db.query("UPDATE api_key SET last_used_at = time::now() WHERE id = $id")
            .bind(("id", id.clone()))
            .await?;
        Ok(())
    }

    pub async fn list_api_keys(db: &Surreal<Any>) -> Result<Vec<ApiKeyRecord>> {
        let mut res = db
            .query("SELECT * FROM api_key ORDER BY created_at DESC")
            .await?;
        let keys: Vec<ApiKeyRecord> = res.take(0)?;
        Ok(keys)
    }

    pub async fn list_active_api_keys(db: &Surreal<Any>) -> Result<Vec<ApiKeyRecord>> {
        let mut res = db
            .query(
                r#"
                SELECT * FROM api_key
                WHERE is_active = true
                  AND (expires_at = NONE OR expires_at > time::now())
                ORDER BY created_at DESC
                "#,
            )
            .await?;
        let keys: Vec<ApiKeyRecord> = res.take(0)?;
        Ok(keys)
    }

    /// Revoke every key with the given prefix. Returns whether any matched.
    pub async fn deactivate_api_key_by_prefix(db: &Surreal<Any>, prefix: &str) -> Result<bool> {
        let mut res = db
            .query("UPDATE api_key SET is_active = false WHERE key_prefix = $prefix RETURN AFTER")
            .bind(("prefix", prefix.to_string()))
            .await?;
        let updated: Vec<ApiKeyRecord> = res.take(0)?;
        Ok(!updated.is_empty())
    }
}
