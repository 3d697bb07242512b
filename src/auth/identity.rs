//! Resolved identity for a single request.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::types::{ApiKeyPrefix, UserId};

/// Display name for requests resolved in `none` mode.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// Display name for requests admitted by network trust.
pub const LOCAL_NETWORK_NAME: &str = "Local Network User";

/// What an API key lookup yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialInfo {
    /// Human-readable name of the key (or its owner)
    pub name: String,
    /// Display prefix, absent for the static deployment key
    pub key_prefix: Option<ApiKeyPrefix>,
    /// Scopes attached to the key
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// What a session lookup yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: bool,
}

/// Transport that carried a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    Bearer,
    Cookie,
}

/// Discriminant of [`Identity`], handy for logs and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    None,
    ApiKey,
    Session,
    TrustedNetwork,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ApiKey => "api_key",
            Self::Session => "session",
            Self::TrustedNetwork => "trusted_network",
        }
    }
}

/// The outcome of authentication.
///
/// Each kind carries a fixed set of fields. Values are built once by the
/// decision engine and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Identity {
    None {
        name: String,
    },
    ApiKey(CredentialInfo),
    Session {
        #[serde(flatten)]
        user: UserInfo,
        source: SessionSource,
    },
    TrustedNetwork {
        name: String,
        client_ip: IpAddr,
    },
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::None {
            name: ANONYMOUS_NAME.to_string(),
        }
    }

    pub fn trusted_network(client_ip: IpAddr) -> Self {
        Self::TrustedNetwork {
            name: LOCAL_NETWORK_NAME.to_string(),
            client_ip,
        }
    }

    pub fn kind(&self) -> IdentityKind {
        match self {
            Self::None { .. } => IdentityKind::None,
            Self::ApiKey(_) => IdentityKind::ApiKey,
            Self::Session { .. } => IdentityKind::Session,
            Self::TrustedNetwork { .. } => IdentityKind::TrustedNetwork,
        }
    }

    /// Whether access was granted without checking a credential.
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::None { .. } | Self::TrustedNetwork { .. })
    }

    /// Only a session user can be an administrator. Key scopes never count.
    pub fn is_admin(&self) -> bool {
        match self {
            Self::Session { user, .. } => user.is_admin,
            Self::ApiKey(_) | Self::None { .. } | Self::TrustedNetwork { .. } => false,
        }
    }

    pub fn user(&self) -> Option<&UserInfo> {
        match self {
            Self::Session { user, .. } => Some(user),
            _ => None,
        }
    }

    /// Get a display-friendly name for this identity.
    pub fn display(&self) -> String {
        match self {
            Self::None { name } | Self::TrustedNetwork { name, .. } => name.clone(),
            Self::ApiKey(info) => info.name.clone(),
            Self::Session { user, .. } => user
                .full_name
                .clone()
                .unwrap_or_else(|| user.username.clone()),
        }
    }
}

/// Wire shape of an identity: the tagged fields plus `trusted`.
#[derive(Debug, Serialize)]
pub struct IdentityView<'a> {
    #[serde(flatten)]
    pub identity: &'a Identity,
    pub trusted: bool,
}

impl<'a> From<&'a Identity> for IdentityView<'a> {
    fn from(identity: &'a Identity) -> Self {
        Self {
            identity,
            trusted: identity.is_trusted(),
        }
    }
}
