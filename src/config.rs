use serde::{Deserialize, Serialize};
use std::{env, fs, path::{Path, PathBuf}};

use crate::auth::{CredentialNames, ModeSetting, TrustedNetworks, DEFAULT_SESSION_TTL_DAYS};

/// Gateway authentication settings.
///
/// Built from the environment, or from a JSON file whose string values may
/// reference environment variables as `${NAME}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Raw mode string; resolved by [`GatewayConfig::mode_setting`]
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    /// Deployment-wide key accepted alongside database keys
    #[serde(default)]
    pub static_api_key: Option<String>,
    /// Extra CIDRs trusted in addition to the private ranges
    #[serde(default)]
    pub trusted_networks: Vec<String>,
    /// Honor X-Forwarded-For / X-Real-IP. Only enable behind a proxy that
    /// overwrites them.
    #[serde(default)]
    pub trust_proxy_headers: bool,
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: u32,
}

fn default_auth_mode() -> String {
    "none".to_string()
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

fn default_session_cookie() -> String {
    "session_token".to_string()
}

fn default_session_ttl_days() -> u32 {
    DEFAULT_SESSION_TTL_DAYS
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            auth_mode: default_auth_mode(),
            api_key_header: default_api_key_header(),
            session_cookie: default_session_cookie(),
            static_api_key: None,
            trusted_networks: Vec::new(),
            trust_proxy_headers: false,
            session_ttl_days: default_session_ttl_days(),
        }
    }
}

impl GatewayConfig {
    /// Build from process environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(mode) = lookup("AUTH_MODE") {
            cfg.auth_mode = mode;
        }
        if let Some(header) = lookup("API_KEY_HEADER").filter(|v| !v.trim().is_empty()) {
            cfg.api_key_header = header.trim().to_string();
        }
        if let Some(cookie) = lookup("SESSION_COOKIE_NAME").filter(|v| !v.trim().is_empty()) {
            cfg.session_cookie = cookie.trim().to_string();
        }
        cfg.static_api_key = lookup("GATEWAY_API_KEY").filter(|v| !v.trim().is_empty());
        if let Some(list) = lookup("TRUSTED_NETWORKS") {
            cfg.trusted_networks = split_list(&list);
        }
        if let Some(flag) = lookup("TRUST_PROXY_HEADERS") {
            cfg.trust_proxy_headers = parse_bool(&flag)
                .ok_or_else(|| anyhow::anyhow!("TRUST_PROXY_HEADERS must be a boolean, got `{}`", flag))?;
        }
        if let Some(days) = lookup("SESSION_TTL_DAYS") {
            cfg.session_ttl_days = days
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("SESSION_TTL_DAYS must be a whole number, got `{}`", days))?;
        }

        Ok(cfg)
    }

    /// Load from a JSON file, expanding `${VAR}` references in string values.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let cfg: GatewayConfig = serde_json::from_str(&raw)?;
        Ok(expand_config(cfg))
    }

    /// File given on the command line, else `GATEWAY_CONFIG`, else environment only.
    pub fn resolve(cli_path: Option<&Path>) -> anyhow::Result<Self> {
        match resolve_config_path(cli_path) {
            Some(path) => Self::load(path),
            None => Self::from_env(),
        }
    }

    pub fn credential_names(&self) -> CredentialNames {
        CredentialNames {
            api_key_header: self.api_key_header.clone(),
            session_cookie: self.session_cookie.clone(),
        }
    }

    pub fn mode_setting(&self) -> ModeSetting {
        ModeSetting::resolve(&self.auth_mode)
    }

    /// Private ranges plus the configured CIDRs. Bad CIDRs are an error.
    pub fn trusted_networks(&self) -> anyhow::Result<TrustedNetworks> {
        TrustedNetworks::with_extra(&self.trusted_networks)
    }
}

pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = cli_path {
        return Some(p.to_path_buf());
    }

    env::var("GATEWAY_CONFIG")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            match env::var(&name) {
                Ok(val) => out.push_str(&val),
                Err(_) => {
                    out.push_str("${");
                    out.push_str(&name);
                    out.push('}');
                }
            }
        } else {
            out.push(ch);
        }
    }

    out
}

fn expand_config(mut cfg: GatewayConfig) -> GatewayConfig {
    cfg.auth_mode = expand_env_vars(&cfg.auth_mode);
    cfg.api_key_header = expand_env_vars(&cfg.api_key_header);
    cfg.session_cookie = expand_env_vars(&cfg.session_cookie);
    cfg.static_api_key = cfg
        .static_api_key
        .map(|k| expand_env_vars(&k))
        .filter(|k| !k.trim().is_empty());
    cfg.trusted_networks = cfg
        .trusted_networks
        .iter()
        .map(|n| expand_env_vars(n))
        .collect();
    cfg
}
