use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pantrypal_gateway::db::{ApiKeyCreate, Db, QueryBuilder, UserCreate};
use pantrypal_gateway::{
    DatabaseConfig, GatewayConfig, UserStore, create_app, create_connection, ensure_schema,
    generate_api_key,
};
use pantrypal_gateway::auth::expiry_after_days;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pantrypal-gateway")]
#[command(about = "PantryPal API gateway authentication service")]
struct Cli {
    /// JSON config file (defaults to $GATEWAY_CONFIG, else environment only)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DbArgs {
    #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
    db_url: String,
}

impl DbArgs {
    async fn connect(self) -> Result<Db> {
        let db_config = DatabaseConfig {
            url: self.db_url,
            ..Default::default()
        };
        info!("Using database url: {}", db_config.url);
        let db = create_connection(db_config).await?;
        ensure_schema(&db).await?;
        Ok(db)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway HTTP server
    Serve {
        #[arg(long, default_value = "0.0.0.0:8000")]
        bind: String,
        /// Overrides the configured authentication mode
        #[arg(long)]
        auth_mode: Option<String>,
        /// Overrides whether X-Forwarded-For / X-Real-IP are honored
        #[arg(long)]
        trust_proxy_headers: Option<bool>,
        #[command(flatten)]
        db: DbArgs,
    },
    /// Initialize the database and create the default admin if there are no users
    Init {
        #[command(flatten)]
        db: DbArgs,
    },
    /// Create a new API key
    CreateApiKey {
        /// Human-readable name for this key
        #[arg(long)]
        name: Option<String>,
        /// Number of days until the key expires (omit for no expiration)
        #[arg(long)]
        expires_days: Option<u32>,
        /// Comma-separated list of scopes for this key
        #[arg(long)]
        scopes: Option<String>,
        #[command(flatten)]
        db: DbArgs,
    },
    /// List all API keys
    ListApiKeys {
        /// Show only active keys
        #[arg(long, default_value_t = false)]
        active_only: bool,
        #[command(flatten)]
        db: DbArgs,
    },
    /// Revoke an API key by its prefix
    RevokeApiKey {
        /// The key prefix to revoke (e.g., "pp_1a2b3c4d")
        key_prefix: String,
        #[command(flatten)]
        db: DbArgs,
    },
    /// Create a user account
    CreateUser {
        username: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long, default_value_t = false)]
        admin: bool,
        #[command(flatten)]
        db: DbArgs,
    },
    /// List user accounts
    ListUsers {
        #[command(flatten)]
        db: DbArgs,
    },
    /// Issue a session token for a user
    IssueSession {
        username: String,
        /// Session lifetime (defaults to the configured TTL)
        #[arg(long)]
        days: Option<u32>,
        #[command(flatten)]
        db: DbArgs,
    },
    /// Revoke every session of a user
    RevokeSessions {
        username: String,
        #[command(flatten)]
        db: DbArgs,
    },
    /// Delete expired sessions
    PurgeSessions {
        #[command(flatten)]
        db: DbArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pantrypal_gateway=info".parse()?)
                .add_directive("surrealdb=warn".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();
    let mut config = GatewayConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            bind,
            auth_mode,
            trust_proxy_headers,
            db,
        } => {
            if let Some(mode) = auth_mode {
                config.auth_mode = mode;
            }
            if let Some(flag) = trust_proxy_headers {
                config.trust_proxy_headers = flag;
            }
            if config.trust_proxy_headers {
                warn!("Trusting X-Forwarded-For / X-Real-IP; make sure a proxy overwrites them");
            }

            let db_config = DatabaseConfig {
                url: db.db_url,
                ..Default::default()
            };
            let app = create_app(config, db_config).await?;

            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!("Gateway listening on http://{}", bind);

            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await?;
        }
        Commands::Init { db } => {
            info!("Initializing database...");
            let db = db.connect().await?;
            let users = UserStore::new(db);

            if users.list_users().await?.is_empty() {
                users
                    .create_user(&UserCreate {
                        username: "admin".to_string(),
                        email: None,
                        full_name: Some("Administrator".to_string()),
                        is_admin: true,
                    })
                    .await?;
                println!("Created default admin user 'admin'.");
                println!("Use `issue-session admin` to obtain a session token.");
            }
            info!("Database initialized successfully");
        }
        Commands::CreateApiKey {
            name,
            expires_days,
            scopes,
            db,
        } => {
            let db = db.connect().await?;

            let (full_key, prefix, key_hash) = generate_api_key();

            let expires_at = expires_days.map(expiry_after_days).transpose()?;

            let scopes_vec = scopes.map(|s| {
                s.split(',')
                    .map(|scope| scope.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            });

            let api_key_create = ApiKeyCreate {
                key_hash,
                key_prefix: prefix.clone(),
                user_id: None,
                name: name.clone(),
                expires_at: expires_at.map(surrealdb::sql::Datetime::from),
                scopes: scopes_vec,
            };

            QueryBuilder::create_api_key(&db, &api_key_create).await?;

            println!("API Key created successfully!");
            println!();
            println!("  Key:     {}", full_key);
            println!("  Prefix:  {}", prefix);
            if let Some(n) = &name {
                println!("  Name:    {}", n);
            }
            match expires_at {
                Some(exp) => println!("  Expires: {}", exp.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("  Expires: Never"),
            }
            println!();
            println!("IMPORTANT: Save this key now. It cannot be retrieved later.");
            println!("Use with: -H '{}: {}'", config.api_key_header, full_key);
        }
        Commands::ListApiKeys { active_only, db } => {
            let db = db.connect().await?;

            let api_keys = if active_only {
                QueryBuilder::list_active_api_keys(&db).await?
            } else {
                QueryBuilder::list_api_keys(&db).await?
            };

            if api_keys.is_empty() {
                println!("No API keys found.");
                return Ok(());
            }

            println!(
                "{:<20} {:<20} {:<10} {:<25} {:<25}",
                "PREFIX", "NAME", "STATUS", "CREATED", "LAST USED"
            );
            println!("{}", "-".repeat(100));

            for key in api_keys {
                let status = if key.is_active { "Active" } else { "Revoked" };
                let name = key.name.unwrap_or_else(|| "-".to_string());
                let created = key
                    .created_at
                    .map(|dt| dt.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let last_used = key
                    .last_used_at
                    .map(|dt| dt.to_string())
                    .unwrap_or_else(|| "Never".to_string());

                println!(
                    "{:<20} {:<20} {:<10} {:<25} {:<25}",
                    key.key_prefix, name, status, created, last_used
                );
            }
        }
        Commands::RevokeApiKey { key_prefix, db } => {
            let db = db.connect().await?;

            if QueryBuilder::deactivate_api_key_by_prefix(&db, &key_prefix).await? {
                println!("API key '{}' has been revoked.", key_prefix);
            } else {
                println!("No API key found with prefix '{}'.", key_prefix);
            }
        }
        Commands::CreateUser {
            username,
            email,
            full_name,
            admin,
            db,
        } => {
            let users = UserStore::new(db.connect().await?);
            let user = users
                .create_user(&UserCreate {
                    username,
                    email,
                    full_name,
                    is_admin: admin,
                })
                .await?;

            println!("User '{}' created ({}).", user.username, user.id);
            if user.is_admin {
                println!("  Role: administrator");
            }
        }
        Commands::ListUsers { db } => {
            let users = UserStore::new(db.connect().await?).list_users().await?;

            if users.is_empty() {
                println!("No users found.");
                return Ok(());
            }

            println!(
                "{:<20} {:<30} {:<10} {:<8} {:<25}",
                "USERNAME", "EMAIL", "STATUS", "ADMIN", "LAST LOGIN"
            );
            println!("{}", "-".repeat(95));

            for user in users {
                let status = if user.is_active { "Active" } else { "Disabled" };
                let admin = if user.is_admin { "yes" } else { "no" };
                let last_login = user
                    .last_login_at
                    .map(|dt| dt.to_string())
                    .unwrap_or_else(|| "Never".to_string());

                println!(
                    "{:<20} {:<30} {:<10} {:<8} {:<25}",
                    user.username,
                    user.email.as_deref().unwrap_or("-"),
                    status,
                    admin,
                    last_login
                );
            }
        }
        Commands::IssueSession { username, days, db } => {
            let users = UserStore::new(db.connect().await?);
            let Some(user) = users.get_user_by_username(&username).await? else {
                anyhow::bail!("No user named '{}'", username);
            };
            if !user.is_active {
                anyhow::bail!("User '{}' is deactivated", username);
            }

            let days = days.unwrap_or(config.session_ttl_days);
            let token = users.create_session(&user.id, None, Some("cli".to_string()), days).await?;

            println!("Session created for '{}' (valid {} days).", username, days);
            println!();
            println!("  Token: {}", token);
            println!();
            println!("Use with: -H 'Authorization: Bearer {}'", token);
            println!("      or: --cookie '{}={}'", config.session_cookie, token);
        }
        Commands::RevokeSessions { username, db } => {
            let users = UserStore::new(db.connect().await?);
            let Some(user) = users.get_user_by_username(&username).await? else {
                anyhow::bail!("No user named '{}'", username);
            };

            let revoked = users.delete_user_sessions(&user.id).await?;
            println!("Revoked {} session(s) for '{}'.", revoked, username);
        }
        Commands::PurgeSessions { db } => {
            let users = UserStore::new(db.connect().await?);
            let purged = users.purge_expired_sessions(chrono::Utc::now()).await?;
            println!("Purged {} expired session(s).", purged);
        }
    }

    Ok(())
}
