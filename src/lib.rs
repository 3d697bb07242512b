// Core modules
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod types;

// Re-export key types and functions
pub use api::{AppState, create_router};
pub use auth::{
    ApiKeyRegistry, AuthEngine, AuthError, AuthMode, CredentialBundle, Identity, ModeSetting,
    TrustedNetworks, UserStore, generate_api_key, hash_api_key,
};
pub use config::GatewayConfig;
pub use db::{DatabaseConfig, create_connection, ensure_schema};

use anyhow::Result;
use axum::Router;
use tracing::info;

/// Convenience function to build the gateway router.
///
/// Connects to the database, makes sure the schema exists and wires the
/// authentication engine to it.
pub async fn create_app(config: GatewayConfig, db_config: DatabaseConfig) -> Result<Router> {
    info!("Using database url: {}", db_config.url);
    let db = create_connection(db_config).await?;
    ensure_schema(&db).await?;

    let state = AppState::new(config, db)?;
    info!(auth_mode = %state.engine.mode(), "Authentication engine ready");

    Ok(create_router(state))
}
