//! User and session storage.

use anyhow::{Result, bail};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use surrealdb::RecordId;
use surrealdb::sql::Datetime;
use tracing::debug;
use uuid::Uuid;

use crate::auth::identity::UserInfo;
use crate::auth::store::SessionStore;
use crate::db::Db;
use crate::db::schema::{SessionRecord, UserCreate, UserRecord};
use crate::types::UserId;

/// Default session lifetime.
pub const DEFAULT_SESSION_TTL_DAYS: u32 = 7;

/// Generate an opaque, URL-safe session token (256 bits of randomness).
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The instant `days` from now. Fails when that is past the representable range.
pub fn expiry_after_days(days: u32) -> Result<DateTime<Utc>> {
    Duration::try_days(i64::from(days))
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| anyhow::anyhow!("A lifetime of {} days is out of range", days))
}

/// Turn a `user:<key>` identifier (or a bare key) into a record id.
pub fn user_record_id(id: &UserId) -> Result<RecordId> {
    let key = id.as_str().strip_prefix("user:").unwrap_or(id.as_str());
    if key.is_empty() {
        bail!("empty user id");
    }
    Ok(RecordId::from_table_key("user", key))
}

#[derive(Debug, Deserialize)]
struct SessionLookup {
    id: RecordId,
    user_id: RecordId,
    expired: bool,
}

/// User store for database operations.
pub struct UserStore {
    db: Db,
}

impl UserStore {
    /// Create a new user store.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create a new user. Usernames are unique.
    pub async fn create_user(&self, create: &UserCreate) -> Result<UserRecord> {
        if self.get_user_by_username(&create.username).await?.is_some() {
            bail!("Username already exists");
        }

        let query = r#"
            CREATE user CONTENT {
                username: $username,
                email: $email,
                full_name: $full_name,
                is_active: true,
                is_admin: $is_admin
            }
        "#;

        let mut res = self.db
            .query(query)
            .bind(("username", create.username.clone()))
            .bind(("email", create.email.clone()))
            .bind(("full_name", create.full_name.clone()))
            .bind(("is_admin", create.is_admin))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        users.into_iter().next()
            .ok_or_else(|| anyhow::anyhow!("Failed to create user"))
    }

    /// Get a user by database ID.
    pub async fn get_user_by_id(&self, user_id: &RecordId) -> Result<Option<UserRecord>> {
        let mut res = self.db
            .query("SELECT * FROM user WHERE id = $id LIMIT 1")
            .bind(("id", user_id.clone()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let mut res = self.db
            .query("SELECT * FROM user WHERE username = $username LIMIT 1")
            .bind(("username", username.to_string()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// All users, newest first.
    pub async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let mut res = self.db
            .query("SELECT * FROM user ORDER BY created_at DESC")
            .await?;
        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users)
    }

    /// Deactivate a user account.
    pub async fn deactivate_user(&self, user_id: &RecordId) -> Result<()> {
        self.set_flag(user_id, "is_active", false).await
    }

    /// Reactivate a user account.
    pub async fn reactivate_user(&self, user_id: &RecordId) -> Result<()> {
        self.set_flag(user_id, "is_active", true).await
    }

    pub async fn set_admin(&self, user_id: &RecordId, is_admin: bool) -> Result<()> {
        self.set_flag(user_id, "is_admin", is_admin).await
    }

    async fn set_flag(&self, user_id: &RecordId, field: &str, value: bool) -> Result<()> {
        // `field` is one of our own column names, never user input.
        let query = format!("UPDATE user SET {} = $flag WHERE id = $id", field);

        self.db
            .query(query)
            .bind(("id", user_id.clone()))
            .bind(("flag", value))
            .await?;

        Ok(())
    }

    /// Delete a user and all of their sessions.
    pub async fn delete_user(&self, user_id: &RecordId) -> Result<bool> {
        self.delete_user_sessions(user_id).await?;

        let mut res = self.db
            .query("DELETE user WHERE id = $id RETURN BEFORE")
            .bind(("id", user_id.clone()))
            .await?;
        let deleted: Vec<UserRecord> = res.take(0)?;
        Ok(!deleted.is_empty())
    }

    /// Start a session lasting `ttl_days`. Returns the token.
    pub async fn create_session(
        &self,
        user_id: &RecordId,
        ip_address: Option<String>,
        user_agent: Option<String>,
        ttl_days: u32,
    ) -> Result<String> {
        let expires_at = expiry_after_days(ttl_days)?;
        self.create_session_until(user_id, ip_address, user_agent, expires_at)
            .await
    }

    /// Start a session that expires at an explicit instant. Returns the token.
    pub async fn create_session_until(
        &self,
        user_id: &RecordId,
        ip_address: Option<String>,
        user_agent: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Result<String> {
        if self.get_user_by_id(user_id).await?.is_none() {
            bail!("User {} does not exist", user_id);
        }

        let token = generate_session_token();
        let now = Datetime::from(Utc::now());

        let query = r#"
            CREATE session CONTENT {
                user_id: $user_id,
                token: $session_token,
                expires_at: $expires_at,
                last_used_at: $now,
                ip_address: $ip_address,
                user_agent: $user_agent
            };
            UPDATE user SET last_login_at = $now WHERE id = $user_id;
        "#;

        self.db
            .query(query)
            .bind(("user_id", user_id.clone()))
            .bind(("session_token", token.clone()))
            .bind(("expires_at", Datetime::from(expires_at)))
            .bind(("now", now))
            .bind(("ip_address", ip_address))
            .bind(("user_agent", user_agent))
            .await?
            .check()?;

        Ok(token)
    }

    /// Validate a session token as of `now`.
    ///
    /// A session whose expiry is at or before `now` is expired; it is deleted
    /// and treated as unknown. Deleting is idempotent, so two requests racing
    /// on the same expired session are harmless.
    pub async fn validate_session_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<UserInfo>> {
        let now = Datetime::from(now);

        let query = r#"
            SELECT id, user_id, (expires_at <= $now) AS expired
            FROM session
            WHERE token = $session_token
            LIMIT 1
        "#;

        let mut res = self.db
            .query(query)
            .bind(("session_token", token.to_string()))
            .bind(("now", now.clone()))
            .await?;

        let sessions: Vec<SessionLookup> = res.take(0)?;
        let Some(session) = sessions.into_iter().next() else {
            return Ok(None);
        };

        if session.expired {
            debug!(session = %session.id, "Removing expired session");
            self.delete_session_by_id(&session.id).await?;
            return Ok(None);
        }

        let Some(user) = self.get_user_by_id(&session.user_id).await? else {
            return Ok(None);
        };

        if !user.is_active {
            return Ok(None);
        }

        self.db
            .query("UPDATE session SET last_used_at = $now WHERE id = $id")
            .bind(("id", session.id.clone()))
            .bind(("now", now))
            .await?;

        Ok(Some(UserInfo {
            id: UserId::new(user.id.to_string()),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            is_admin: user.is_admin,
        }))
    }

    async fn delete_session_by_id(&self, id: &RecordId) -> Result<()> {
        self.db
            .query("DELETE session WHERE id = $id")
            .bind(("id", id.clone()))
            .await?;
        Ok(())
    }

    /// Delete a session (logout). Returns whether it existed.
    pub async fn delete_session(&self, token: &str) -> Result<bool> {
        let mut res = self.db
            .query("DELETE session WHERE token = $session_token RETURN BEFORE")
            .bind(("session_token", token.to_string()))
            .await?;
        let deleted: Vec<SessionRecord> = res.take(0)?;
        Ok(!deleted.is_empty())
    }

    /// Delete every session of a user. Returns how many were removed.
    pub async fn delete_user_sessions(&self, user_id: &RecordId) -> Result<usize> {
        let mut res = self.db
            .query("DELETE session WHERE user_id = $user_id RETURN BEFORE")
            .bind(("user_id", user_id.clone()))
            .await?;
        let deleted: Vec<SessionRecord> = res.take(0)?;
        Ok(deleted.len())
    }

    /// Delete every session expired as of `now`.
    pub async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut res = self.db
            .query("DELETE session WHERE expires_at <= $now RETURN BEFORE")
            .bind(("now", Datetime::from(now)))
            .await?;
        let deleted: Vec<SessionRecord> = res.take(0)?;
        Ok(deleted.len())
    }

    pub async fn list_user_sessions(&self, user_id: &RecordId) -> Result<Vec<SessionRecord>> {
        let mut res = self.db
            .query("SELECT * FROM session WHERE user_id = $user_id ORDER BY created_at DESC")
            .bind(("user_id", user_id.clone()))
            .await?;
        let sessions: Vec<SessionRecord> = res.take(0)?;
        Ok(sessions)
    }
}

#[async_trait]
impl SessionStore for UserStore {
    async fn validate_session(&self, token: &str) -> Result<Option<UserInfo>> {
        self.validate_session_at(token, Utc::now()).await
    }
}
