//! Request extractors that run the authentication engine.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use tracing::instrument;

use crate::api::AppState;
use crate::auth::{AuthError, CredentialBundle, Identity, get_client_ip};

/// Any request the configured mode lets through.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

/// A session-authenticated administrator.
#[derive(Debug, Clone)]
pub struct AdminOnly(pub Identity);

/// Credentials and origin of the request as the engine sees them.
pub(crate) fn request_inputs(parts: &Parts, state: &AppState) -> (CredentialBundle, Option<IpAddr>) {
    let bundle = CredentialBundle::from_headers(&parts.headers, &state.names);
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = get_client_ip(&parts.headers, peer, state.config.trust_proxy_headers);
    (bundle, client_ip)
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AuthError;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let (bundle, client_ip) = request_inputs(parts, state);
        state.engine.resolve(&bundle, client_ip).await.map(Authenticated)
    }
}

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let (bundle, client_ip) = request_inputs(parts, state);
        state.engine.require_admin(&bundle, client_ip).await.map(AdminOnly)
    }
}
