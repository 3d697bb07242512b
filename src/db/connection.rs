use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("SURREALDB_URL")
                .unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("SURREALDB_NAMESPACE")
                .unwrap_or_else(|_| "pantrypal".to_string()),
            database: env::var("SURREALDB_DATABASE")
                .unwrap_or_else(|_| "gateway".to_string()),
            username: env::var("SURREALDB_USERNAME").ok(),
            password: env::var("SURREALDB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = vec![
        // Users. Active and admin flags live here, not on sessions.
        "DEFINE TABLE IF NOT EXISTS user SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS username ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS email ON TABLE user TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS full_name ON TABLE user TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS is_active ON TABLE user TYPE bool DEFAULT true;
         DEFINE FIELD IF NOT EXISTS is_admin ON TABLE user TYPE bool DEFAULT false;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE user TYPE datetime DEFAULT time::now();
         DEFINE FIELD IF NOT EXISTS last_login_at ON TABLE user TYPE option<datetime>;",

        // Sessions
        "DEFINE TABLE IF NOT EXISTS session SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS user_id ON TABLE session TYPE record<user>;
         DEFINE FIELD IF NOT EXISTS token ON TABLE session TYPE string;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE session TYPE datetime DEFAULT time::now();
         DEFINE FIELD IF NOT EXISTS expires_at ON TABLE session TYPE datetime;
         DEFINE FIELD IF NOT EXISTS last_used_at ON TABLE session TYPE datetime;
         DEFINE FIELD IF NOT EXISTS ip_address ON TABLE session TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS user_agent ON TABLE session TYPE option<string>;",

        // API keys (only the hash is stored)
        "DEFINE TABLE IF NOT EXISTS api_key SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS key_hash ON TABLE api_key TYPE string;
         DEFINE FIELD IF NOT EXISTS key_prefix ON TABLE api_key TYPE string;
         DEFINE FIELD IF NOT EXISTS user_id ON TABLE api_key TYPE option<record<user>>;
         DEFINE FIELD IF NOT EXISTS name ON TABLE api_key TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS is_active ON TABLE api_key TYPE bool DEFAULT true;
         DEFINE FIELD IF NOT EXISTS expires_at ON TABLE api_key TYPE option<datetime>;
         DEFINE FIELD IF NOT EXISTS scopes ON TABLE api_key TYPE option<array<string>>;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE api_key TYPE datetime DEFAULT time::now();
         DEFINE FIELD IF NOT EXISTS last_used_at ON TABLE api_key TYPE option<datetime>;",

        // Indexes
        "DEFINE INDEX IF NOT EXISTS user_username ON TABLE user COLUMNS username UNIQUE;
         DEFINE INDEX IF NOT EXISTS session_token ON TABLE session COLUMNS token UNIQUE;
         DEFINE INDEX IF NOT EXISTS session_user ON TABLE session COLUMNS user_id;
         DEFINE INDEX IF NOT EXISTS api_key_hash ON TABLE api_key COLUMNS key_hash UNIQUE;
         DEFINE INDEX IF NOT EXISTS api_key_prefix ON TABLE api_key COLUMNS key_prefix;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}
