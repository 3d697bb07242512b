// REST API endpoints for the gateway

mod error;
mod extract;

pub use error::ApiError;
pub use extract::{AdminOnly, Authenticated};

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{
    ApiKeyRegistry, AuthEngine, AuthMode, CredentialBundle, CredentialNames, Identity,
    IdentityView, SessionSource, UserStore, user_record_id,
};
use crate::config::GatewayConfig;
use crate::db::Db;
use crate::types::UserId;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AuthEngine>,
    pub users: Arc<UserStore>,
    pub config: Arc<GatewayConfig>,
    pub names: Arc<CredentialNames>,
}

impl AppState {
    /// Wire the engine to database-backed stores.
    pub fn new(config: GatewayConfig, db: Db) -> anyhow::Result<Self> {
        let users = Arc::new(UserStore::new(db.clone()));
        let api_keys = Arc::new(ApiKeyRegistry::new(db, config.static_api_key.clone()));
        if api_keys.has_static_key() {
            info!("Static API key configured");
        }
        let network = Arc::new(config.trusted_networks()?);

        let engine = AuthEngine::new(config.mode_setting(), api_keys, users.clone(), network);

        Ok(Self {
            engine: Arc::new(engine),
            users,
            names: Arc::new(config.credential_names()),
            config: Arc::new(config),
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/status", get(auth_status))
        .route("/api/auth/me", get(current_identity))
        .route("/api/auth/logout", post(logout))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/{id}/sessions", delete(revoke_user_sessions))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "auth_mode": state.engine.mode().to_string(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Lets clients discover which credentials they need before sending any.
async fn auth_status(State(state): State<AppState>) -> Json<Value> {
    let mode = state.engine.mode();
    Json(json!({
        "auth_mode": mode.to_string(),
        "requires_api_key": mode.active() == Some(AuthMode::ApiKeyOnly),
    }))
}

async fn current_identity(Authenticated(identity): Authenticated) -> Json<Value> {
    Json(json!(IdentityView::from(&identity)))
}

/// Delete the session that authenticated this request (if any) and clear the cookie.
async fn logout(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let bundle = CredentialBundle::from_headers(&headers, &state.names);

    let token = match &identity {
        Identity::Session { source: SessionSource::Bearer, .. } => bundle.bearer_token.as_deref(),
        Identity::Session { source: SessionSource::Cookie, .. } => bundle.session_cookie.as_deref(),
        _ => None,
    };

    let revoked = match token {
        Some(token) => state.users.delete_session(token).await?,
        None => false,
    };

    if revoked {
        info!(user = %identity.display(), "Session logged out");
    }

    let mut response = Json(json!({
        "status": "logged_out",
        "session_revoked": revoked,
    }))
    .into_response();

    let clear = format!(
        "{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax",
        state.names.session_cookie
    );
    if let Ok(value) = HeaderValue::from_str(&clear) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }

    Ok(response)
}

async fn list_users(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
) -> Result<Json<Value>, ApiError> {
    let records = state.users.list_users().await?;

    let mut users = Vec::with_capacity(records.len());
    for u in records {
        let sessions = state.users.list_user_sessions(&u.id).await?.len();
        users.push(json!({
            "id": u.id.to_string(),
            "username": u.username,
            "email": u.email,
            "full_name": u.full_name,
            "is_active": u.is_active,
            "is_admin": u.is_admin,
            "sessions": sessions,
        }));
    }

    Ok(Json(json!({
        "count": users.len(),
        "users": users,
    })))
}

async fn revoke_user_sessions(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user_id = user_record_id(&UserId::new(id.clone()))
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if state.users.get_user_by_id(&user_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("User {} not found", id)));
    }

    let revoked = state.users.delete_user_sessions(&user_id).await?;
    info!(admin = %admin.display(), user = %user_id, revoked, "Revoked user sessions");

    Ok(Json(json!({
        "user_id": user_id.to_string(),
        "revoked": revoked,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ApiKeyCreate, DatabaseConfig, QueryBuilder, UserCreate, create_connection, ensure_schema};
    use crate::auth::generate_api_key;
    use axum::body::{Body, to_bytes};
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use std::net::SocketAddr;
    use tower::ServiceExt;

    const PUBLIC_PEER: &str = "203.0.113.10:50000";
    const LAN_PEER: &str = "192.168.1.20:50000";

    struct Fixture {
        router: Router,
        state: AppState,
        db: Db,
    }

    async fn fixture(mode: &str) -> Fixture {
        let db = create_connection(DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        ensure_schema(&db).await.unwrap();

        let config = GatewayConfig {
            auth_mode: mode.to_string(),
            static_api_key: Some("static-key".to_string()),
            ..Default::default()
        };
        let state = AppState::new(config, db.clone()).unwrap();
        Fixture {
            router: create_router(state.clone()),
            state,
            db,
        }
    }

    async fn session_for(state: &AppState, username: &str, is_admin: bool) -> String {
        let user = state
            .users
            .create_user(&UserCreate {
                username: username.to_string(),
                email: None,
                full_name: None,
                is_admin,
            })
            .await
            .unwrap();
        state.users.create_session(&user.id, None, None, 7).await.unwrap()
    }

    fn request(method: &str, uri: &str, peer: &str, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    #[tokio::test]
    async fn test_health_reports_mode() {
        let f = fixture("smart").await;
        let (status, _, body) = send(&f.router, request("GET", "/health", PUBLIC_PEER, &[])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["auth_mode"], "smart");
    }

    #[tokio::test]
    async fn test_auth_status_needs_no_credentials() {
        for (mode, requires_key) in [
            ("none", false),
            ("api_key_only", true),
            ("full", false),
            ("smart", false),
        ] {
            let f = fixture(mode).await;
            let (status, _, body) =
                send(&f.router, request("GET", "/api/auth/status", PUBLIC_PEER, &[])).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["auth_mode"], mode);
            assert_eq!(body["requires_api_key"], requires_key);
        }

        let f = fixture("oauth").await;
        let (status, _, body) =
            send(&f.router, request("GET", "/api/auth/status", PUBLIC_PEER, &[])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requires_api_key"], false);
    }

    #[tokio::test]
    async fn test_none_mode_is_anonymous() {
        let f = fixture("none").await;
        let (status, _, body) = send(&f.router, request("GET", "/api/auth/me", PUBLIC_PEER, &[])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "none");
        assert_eq!(body["name"], "Anonymous");
        assert_eq!(body["trusted"], true);
    }

    #[tokio::test]
    async fn test_api_key_only_mode() {
        let f = fixture("api_key_only").await;

        let (status, headers, body) =
            send(&f.router, request("GET", "/api/auth/me", PUBLIC_PEER, &[])).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers.get(header::WWW_AUTHENTICATE).unwrap(), "ApiKey");
        assert_eq!(body["detail"], "Missing API key. Please provide X-API-Key header.");

        let (status, _, body) = send(
            &f.router,
            request("GET", "/api/auth/me", PUBLIC_PEER, &[("X-API-Key", "wrong")]),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Invalid or expired API key");

        let (status, _, body) = send(
            &f.router,
            request("GET", "/api/auth/me", PUBLIC_PEER, &[("X-API-Key", "static-key")]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "api_key");
        assert_eq!(body["name"], "Static API Key");
    }

    #[tokio::test]
    async fn test_full_mode_database_key_and_session() {
        let f = fixture("full").await;

        let (key, prefix, key_hash) = generate_api_key();
        QueryBuilder::create_api_key(&f.db, &ApiKeyCreate {
            key_hash,
            key_prefix: prefix,
            user_id: None,
            name: Some("pantry-sync".to_string()),
            expires_at: None,
            scopes: None,
        })
        .await
        .unwrap();

        let (status, _, body) = send(
            &f.router,
            request("GET", "/api/auth/me", PUBLIC_PEER, &[("X-API-Key", key.as_str())]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "pantry-sync");

        let token = session_for(&f.state, "olivia", false).await;
        let cookie = format!("session_token={}", token);
        let (status, _, body) = send(
            &f.router,
            request(
                "GET",
                "/api/auth/me",
                PUBLIC_PEER,
                &[("X-API-Key", "bogus"), ("Cookie", cookie.as_str())],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "session");
        assert_eq!(body["username"], "olivia");
        assert_eq!(body["source"], "cookie");

        let (status, headers, body) =
            send(&f.router, request("GET", "/api/auth/me", PUBLIC_PEER, &[])).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers.get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
        assert!(body["detail"].as_str().unwrap().starts_with("Authentication required"));
    }

    #[tokio::test]
    async fn test_smart_mode_trusts_lan_only() {
        let f = fixture("smart").await;

        let (status, _, body) = send(&f.router, request("GET", "/api/auth/me", LAN_PEER, &[])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "trusted_network");
        assert_eq!(body["name"], "Local Network User");
        assert_eq!(body["trusted"], true);

        let (status, _, _) = send(&f.router, request("GET", "/api/auth/me", PUBLIC_PEER, &[])).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_forwarded_headers_ignored_by_default() {
        let f = fixture("smart").await;
        let (status, _, _) = send(
            &f.router,
            request("GET", "/api/auth/me", PUBLIC_PEER, &[("X-Forwarded-For", "10.0.0.1")]),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_mode_is_server_error() {
        let f = fixture("oauth").await;
        let (status, _, body) = send(
            &f.router,
            request("GET", "/api/auth/me", LAN_PEER, &[("X-API-Key", "static-key")]),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Authentication is misconfigured");

        let (status, _, _) = send(&f.router, request("GET", "/health", LAN_PEER, &[])).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_routes() {
        let f = fixture("full").await;
        let admin = session_for(&f.state, "root", true).await;
        let member = session_for(&f.state, "member", false).await;
        let admin_auth = format!("Bearer {}", admin);
        let member_auth = format!("Bearer {}", member);

        let (status, _, body) = send(
            &f.router,
            request("GET", "/api/admin/users", PUBLIC_PEER, &[("Authorization", admin_auth.as_str())]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert!(body["users"].as_array().unwrap().iter().all(|u| u["sessions"] == 1));

        let (status, _, body) = send(
            &f.router,
            request("GET", "/api/admin/users", PUBLIC_PEER, &[("Authorization", member_auth.as_str())]),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["detail"], "Admin access required");

        let (status, _, _) = send(
            &f.router,
            request("GET", "/api/admin/users", PUBLIC_PEER, &[("X-API-Key", "static-key")]),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let member_id = f.state.users.get_user_by_username("member").await.unwrap().unwrap().id;
        let uri = format!("/api/admin/users/{}/sessions", member_id);
        let (status, _, body) = send(
            &f.router,
            request("DELETE", &uri, PUBLIC_PEER, &[("Authorization", admin_auth.as_str())]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["revoked"], 1);

        let (status, _, _) = send(
            &f.router,
            request("GET", "/api/auth/me", PUBLIC_PEER, &[("Authorization", member_auth.as_str())]),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) = send(
            &f.router,
            request("DELETE", "/api/admin/users/user:nobody/sessions", PUBLIC_PEER, &[("Authorization", admin_auth.as_str())]),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_smart_mode_lan_is_not_admin() {
        let f = fixture("smart").await;
        let (status, _, _) = send(&f.router, request("GET", "/api/admin/users", LAN_PEER, &[])).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_unavailable_in_none_mode() {
        let f = fixture("none").await;
        let (status, _, _) = send(&f.router, request("GET", "/api/admin/users", PUBLIC_PEER, &[])).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let f = fixture("full").await;
        let token = session_for(&f.state, "paul", false).await;
        let cookie = format!("session_token={}", token);

        let (status, headers, body) = send(
            &f.router,
            request("POST", "/api/auth/logout", PUBLIC_PEER, &[("Cookie", cookie.as_str())]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_revoked"], true);
        let set_cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with("session_token=;"));

        let (status, _, _) = send(
            &f.router,
            request("GET", "/api/auth/me", PUBLIC_PEER, &[("Cookie", cookie.as_str())]),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_revokes_the_session_that_authenticated() {
        let f = fixture("full").await;
        let token = session_for(&f.state, "quinn", false).await;
        let cookie = format!("session_token={}", token);
        let headers = [("Cookie", cookie.as_str()), ("Authorization", "Bearer stale")];

        let (status, _, body) =
            send(&f.router, request("POST", "/api/auth/logout", PUBLIC_PEER, &headers)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_revoked"], true);

        let (status, _, _) = send(
            &f.router,
            request("GET", "/api/auth/me", PUBLIC_PEER, &[("Cookie", cookie.as_str())]),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_with_api_key_leaves_sessions_alone() {
        let f = fixture("full").await;
        let token = session_for(&f.state, "rita", false).await;
        let cookie = format!("session_token={}", token);

        let (status, _, body) = send(
            &f.router,
            request(
                "POST",
                "/api/auth/logout",
                PUBLIC_PEER,
                &[("X-API-Key", "static-key"), ("Cookie", cookie.as_str())],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_revoked"], false);

        let (status, _, _) = send(
            &f.router,
            request("GET", "/api/auth/me", PUBLIC_PEER, &[("Cookie", cookie.as_str())]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
