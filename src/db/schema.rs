use serde::{Deserialize, Serialize};
use surrealdb::{RecordId, sql::Datetime};

use crate::types::{ApiKeyHash, ApiKeyPrefix};

/// Persisted user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Database identifier
    pub id: RecordId,
    /// Unique login name
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    /// Inactive users cannot authenticate with any session
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: Option<Datetime>,
    pub last_login_at: Option<Datetime>,
}

/// Payload for creating a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: bool,
}

/// Persisted login session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: RecordId,
    /// Owning user
    pub user_id: RecordId,
    /// Opaque bearer/cookie token
    pub token: String,
    pub created_at: Option<Datetime>,
    /// The session is expired once `now >= expires_at`
    pub expires_at: Datetime,
    pub last_used_at: Datetime,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Persisted API key record for database-backed authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Database identifier
    pub id: RecordId,
    /// SHA-256 hash of the full API key (never store raw keys)
    pub key_hash: ApiKeyHash,
    /// First part of the key for display/identification (e.g., "pp_1a2b3c4d")
    pub key_prefix: ApiKeyPrefix,
    /// Optional reference to the user who owns this key
    pub user_id: Option<RecordId>,
    /// Human-readable name for this key
    pub name: Option<String>,
    /// Whether the key is active (can be revoked)
    pub is_active: bool,
    /// Optional expiration time
    pub expires_at: Option<Datetime>,
    /// Optional list of scopes/permissions for this key
    pub scopes: Option<Vec<String>>,
    /// When the key was created
    pub created_at: Option<Datetime>,
    /// Last time the key was used for authentication
    pub last_used_at: Option<Datetime>,
}

/// Payload for creating a new API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyCreate {
    /// SHA-256 hash of the full API key
    pub key_hash: ApiKeyHash,
    /// First part of the key for display/identification
    pub key_prefix: ApiKeyPrefix,
    /// Optional reference to the user who owns this key
    pub user_id: Option<RecordId>,
    /// Human-readable name for this key
    pub name: Option<String>,
    /// Optional expiration time
    pub expires_at: Option<Datetime>,
    /// Optional list of scopes/permissions for this key
    pub scopes: Option<Vec<String>>,
}
