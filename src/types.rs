//! NewType wrappers for credential-related strings.
//!
//! These keep hashed keys, display prefixes and user identifiers from being
//! passed where a raw secret is expected (and vice versa).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Stable identifier of a user record (e.g., "user:abc123").
    ///
    /// This is what session identities expose as `id` and what the admin
    /// endpoints accept in their path.
    UserId
);

newtype_string!(
    /// SHA-256 hash of an API key for secure storage and lookup.
    ///
    /// API keys are never stored in plain text. The hash is computed once
    /// when the key is created or received and compared from then on.
    ApiKeyHash
);

newtype_string!(
    /// Display prefix of an API key (e.g., "pp_1a2b3c4d").
    ///
    /// Safe to show in listings and logs. It cannot be used to authenticate.
    ApiKeyPrefix
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_from_string() {
        let id: UserId = "user:abc123".into();
        assert_eq!(id.as_str(), "user:abc123");

        let id: UserId = String::from("user:xyz789").into();
        assert_eq!(id.to_string(), "user:xyz789");
    }

    #[test]
    fn test_newtype_serde_is_transparent() {
        let prefix = ApiKeyPrefix::new("pp_1a2b3c4d");
        let json = serde_json::to_string(&prefix).unwrap();
        assert_eq!(json, "\"pp_1a2b3c4d\"");

        let parsed: ApiKeyPrefix = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, prefix);
    }

    #[test]
    fn test_hash_equality_and_borrow() {
        use std::borrow::Borrow;
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(ApiKeyHash::new("abc"));
        assert!(set.contains("abc"));
        assert!(!set.contains("def"));

        let hash = ApiKeyHash::new("abc");
        let s: &str = hash.borrow();
        assert_eq!(s, "abc");
        assert_eq!(hash.into_inner(), "abc");
    }
}
