//! Lookup capabilities the decision engine consumes.
//!
//! `Ok(None)` covers every "no match" outcome (unknown, expired, revoked,
//! malformed). `Err` is reserved for the store itself failing; the engine
//! treats both the same way towards the caller.

use anyhow::Result;
use async_trait::async_trait;

use crate::auth::identity::{CredentialInfo, UserInfo};

/// Validates API keys.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn validate_api_key(&self, key: &str) -> Result<Option<CredentialInfo>>;
}

/// Validates session tokens.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn validate_session(&self, token: &str) -> Result<Option<UserInfo>>;
}
