//! The authentication decision engine and admin gate.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::auth::error::{AuthError, ForbiddenReason};
use crate::auth::extractor::CredentialBundle;
use crate::auth::identity::{Identity, IdentityKind, SessionSource};
use crate::auth::mode::{AuthMode, ModeSetting};
use crate::auth::network::NetworkClassifier;
use crate::auth::store::{ApiKeyStore, SessionStore};

/// A place a credential can come from, in the order the chain tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    ApiKeyHeader,
    BearerToken,
    SessionCookie,
}

/// Precedence for `full` mode and for untrusted origins in `smart` mode.
///
/// The API key comes first so that a service presenting both a key and a
/// browser session resolves to the service identity.
pub const CREDENTIAL_CHAIN: [CredentialSource; 3] = [
    CredentialSource::ApiKeyHeader,
    CredentialSource::BearerToken,
    CredentialSource::SessionCookie,
];

impl CredentialSource {
    /// The candidate this source contributes, if the request carried one.
    pub fn pick<'a>(&self, bundle: &'a CredentialBundle) -> Option<&'a str> {
        match self {
            Self::ApiKeyHeader => bundle.api_key.as_deref(),
            Self::BearerToken => bundle.bearer_token.as_deref(),
            Self::SessionCookie => bundle.session_cookie.as_deref(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKeyHeader => "api_key",
            Self::BearerToken => "bearer_token",
            Self::SessionCookie => "session_cookie",
        }
    }
}

/// Resolves requests to identities according to the configured mode.
///
/// Holds only immutable state and shared store handles, so one instance
/// serves every request concurrently.
pub struct AuthEngine {
    mode: ModeSetting,
    api_keys: Arc<dyn ApiKeyStore>,
    sessions: Arc<dyn SessionStore>,
    network: Arc<dyn NetworkClassifier>,
}

impl AuthEngine {
    /// Create a new engine. The mode is fixed for the engine's lifetime.
    pub fn new(
        mode: ModeSetting,
        api_keys: Arc<dyn ApiKeyStore>,
        sessions: Arc<dyn SessionStore>,
        network: Arc<dyn NetworkClassifier>,
    ) -> Self {
        if let ModeSetting::Invalid(raw) = &mode {
            error!(
                auth_mode = %raw,
                "Invalid AUTH_MODE configured; every authenticated request will fail"
            );
        }

        Self {
            mode,
            api_keys,
            sessions,
            network,
        }
    }

    pub fn mode(&self) -> &ModeSetting {
        &self.mode
    }

    /// Resolve the identity of a request.
    pub async fn resolve(
        &self,
        bundle: &CredentialBundle,
        client_ip: Option<IpAddr>,
    ) -> Result<Identity, AuthError> {
        let mode = match &self.mode {
            ModeSetting::Active(mode) => *mode,
            ModeSetting::Invalid(raw) => {
                error!(auth_mode = %raw, "Rejecting request: invalid AUTH_MODE");
                return Err(AuthError::InvalidConfiguration(raw.clone()));
            }
        };

        let result = match mode {
            AuthMode::None => Ok(Identity::anonymous()),
            AuthMode::ApiKeyOnly => self.resolve_api_key_only(bundle).await,
            AuthMode::Full => self.resolve_chain(bundle).await,
            AuthMode::Smart => self.resolve_smart(bundle, client_ip).await,
        };

        match &result {
            Ok(identity) => debug!(
                mode = %mode,
                kind = identity.kind().as_str(),
                "Request authenticated"
            ),
            Err(e) => debug!(mode = %mode, error = %e, "Request not authenticated"),
        }

        result
    }

    /// Resolve the identity and require a session-authenticated admin.
    pub async fn require_admin(
        &self,
        bundle: &CredentialBundle,
        client_ip: Option<IpAddr>,
    ) -> Result<Identity, AuthError> {
        let supports_admin = self
            .mode
            .active()
            .is_some_and(|mode| mode.supports_admin());

        if !supports_admin {
            return Err(self.forbid(ForbiddenReason::AdminUnavailableInMode, None));
        }

        let identity = self.resolve(bundle, client_ip).await?;

        if identity.kind() != IdentityKind::Session {
            return Err(self.forbid(ForbiddenReason::NotSessionIdentity, Some(&identity)));
        }

        if !identity.is_admin() {
            return Err(self.forbid(ForbiddenReason::NotAdministrator, Some(&identity)));
        }

        Ok(identity)
    }

    fn forbid(&self, reason: ForbiddenReason, identity: Option<&Identity>) -> AuthError {
        warn!(
            mode = %self.mode,
            kind = identity.map(|i| i.kind().as_str()).unwrap_or("-"),
            reason = reason.as_str(),
            "Admin access denied"
        );
        AuthError::Forbidden(reason)
    }

    async fn resolve_api_key_only(&self, bundle: &CredentialBundle) -> Result<Identity, AuthError> {
        let key = bundle
            .api_key
            .as_deref()
            .ok_or(AuthError::MissingCredential)?;

        self.validate(CredentialSource::ApiKeyHeader, key)
            .await
            .ok_or(AuthError::InvalidCredential)
    }

    async fn resolve_smart(
        &self,
        bundle: &CredentialBundle,
        client_ip: Option<IpAddr>,
    ) -> Result<Identity, AuthError> {
        // Network trust grants access outright; credentials are not looked at.
        if let Some(ip) = client_ip
            && self.network.is_trusted_network(ip)
        {
            return Ok(Identity::trusted_network(ip));
        }

        self.resolve_chain(bundle).await
    }

    /// Try each source in precedence order; first successful validation wins.
    async fn resolve_chain(&self, bundle: &CredentialBundle) -> Result<Identity, AuthError> {
        if bundle.is_empty() {
            debug!("No credentials presented");
            return Err(AuthError::Unauthenticated);
        }

        for source in CREDENTIAL_CHAIN {
            let Some(candidate) = source.pick(bundle) else {
                continue;
            };

            if let Some(identity) = self.validate(source, candidate).await {
                return Ok(identity);
            }

            debug!(source = source.as_str(), "Credential rejected, trying next source");
        }

        Err(AuthError::Unauthenticated)
    }

    /// Validate one candidate against the store behind its source.
    ///
    /// Store failures are logged and reported as "no match" so the caller
    /// cannot tell a broken store from a bad credential.
    async fn validate(&self, source: CredentialSource, candidate: &str) -> Option<Identity> {
        let outcome = match source {
            CredentialSource::ApiKeyHeader => self
                .api_keys
                .validate_api_key(candidate)
                .await
                .map(|info| info.map(Identity::ApiKey)),
            CredentialSource::BearerToken | CredentialSource::SessionCookie => {
                let transport = if source == CredentialSource::BearerToken {
                    SessionSource::Bearer
                } else {
                    SessionSource::Cookie
                };
                self.sessions
                    .validate_session(candidate)
                    .await
                    .map(|user| {
                        user.map(|user| Identity::Session {
                            user,
                            source: transport,
                        })
                    })
            }
        };

        match outcome {
            Ok(identity) => identity,
            Err(e) => {
                warn!(source = source.as_str(), error = %e, "Credential store lookup failed");
                None
            }
        }
    }
}
