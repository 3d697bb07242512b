//! Process-wide authentication mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which credential sources the gateway honors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// No authentication; every request is anonymous.
    None,
    /// Only the API key header is accepted.
    ApiKeyOnly,
    /// API key, bearer token or session cookie.
    Full,
    /// Trusted networks pass through, everyone else as in `Full`.
    Smart,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ApiKeyOnly => "api_key_only",
            Self::Full => "full",
            Self::Smart => "smart",
        }
    }

    /// Whether the admin gate can ever succeed in this mode.
    pub fn supports_admin(&self) -> bool {
        matches!(self, Self::Full | Self::Smart)
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "api_key_only" => Ok(Self::ApiKeyOnly),
            "full" => Ok(Self::Full),
            "smart" => Ok(Self::Smart),
            other => Err(format!(
                "Invalid AUTH_MODE: {}. Must be 'none', 'api_key_only', 'full', or 'smart'.",
                other
            )),
        }
    }
}

/// The mode as resolved at startup.
///
/// An unrecognised value is kept rather than rejected so the process still
/// starts and every request can report the misconfiguration as a server
/// error instead of a credential failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeSetting {
    Active(AuthMode),
    Invalid(String),
}

impl ModeSetting {
    /// Normalize the raw configuration value. Called once at startup.
    pub fn resolve(raw: &str) -> Self {
        match raw.parse::<AuthMode>() {
            Ok(mode) => Self::Active(mode),
            Err(_) => Self::Invalid(raw.to_string()),
        }
    }

    pub fn active(&self) -> Option<AuthMode> {
        match self {
            Self::Active(mode) => Some(*mode),
            Self::Invalid(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

impl Default for ModeSetting {
    fn default() -> Self {
        Self::Active(AuthMode::None)
    }
}

impl From<AuthMode> for ModeSetting {
    fn from(mode: AuthMode) -> Self {
        Self::Active(mode)
    }
}

impl fmt::Display for ModeSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active(mode) => write!(f, "{}", mode),
            Self::Invalid(raw) => write!(f, "invalid({})", raw),
        }
    }
}
