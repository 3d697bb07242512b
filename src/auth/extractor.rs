//! Credential extraction from HTTP requests.
//!
//! Extraction is syntactic only: nothing here validates a credential or
//! touches a store.

use std::collections::HashMap;

use http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Header and cookie names the extractor reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialNames {
    /// Header carrying the API key
    pub api_key_header: String,
    /// Cookie carrying the session token
    pub session_cookie: String,
}

impl Default for CredentialNames {
    fn default() -> Self {
        Self {
            api_key_header: "X-API-Key".to_string(),
            session_cookie: "session_token".to_string(),
        }
    }
}

/// Candidate credentials found on one request.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    pub session_cookie: Option<String>,
}

impl CredentialBundle {
    /// Build a bundle from a header map and an already-parsed cookie map.
    pub fn extract(
        headers: &HeaderMap,
        cookies: &HashMap<String, String>,
        names: &CredentialNames,
    ) -> Self {
        let api_key = header_str(headers, &names.api_key_header).and_then(non_empty);

        let bearer_token = header_str(headers, http::header::AUTHORIZATION.as_str())
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(non_empty);

        let session_cookie = cookies
            .get(&names.session_cookie)
            .map(String::as_str)
            .and_then(non_empty);

        Self {
            api_key,
            bearer_token,
            session_cookie,
        }
    }

    /// Build a bundle straight from headers, parsing the `Cookie` header.
    pub fn from_headers(headers: &HeaderMap, names: &CredentialNames) -> Self {
        Self::extract(headers, &parse_cookies(headers), names)
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.bearer_token.is_none() && self.session_cookie.is_none()
    }
}

// Never print raw secrets.
impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field(
                "session_cookie",
                &self.session_cookie.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Parse every `Cookie` header into a name -> value map.
///
/// Later occurrences of a name overwrite earlier ones. Pairs without `=`
/// are skipped.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for value in headers.get_all(http::header::COOKIE) {
        let Ok(raw) = value.to_str() else {
            continue;
        };

        for pair in raw.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                cookies.insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }

    cookies
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
