//! Authentication for the gateway.
//!
//! Every request is resolved to an [`Identity`] according to the process-wide
//! [`AuthMode`]:
//!
//! - **none**: everyone is anonymous
//! - **api_key_only**: the API key header is required
//! - **full**: API key, then bearer session token, then session cookie
//! - **smart**: requests from trusted networks are let through as-is; other
//!   origins go through the `full` chain
//!
//! Admin routes additionally require a session identity whose user is an
//! administrator, and are only available in `full` and `smart` modes.
//!
//! ## Usage
//!
//! ```ignore
//! let bundle = CredentialBundle::from_headers(&headers, &config.credential_names());
//! let identity = engine.resolve(&bundle, client_ip).await?;
//! ```

mod api_keys;
mod engine;
mod error;
mod extractor;
mod identity;
mod mode;
mod network;
mod store;
mod user_store;

pub use api_keys::{ApiKeyRegistry, STATIC_KEY_NAME, generate_api_key, hash_api_key};
pub use engine::{AuthEngine, CREDENTIAL_CHAIN, CredentialSource};
pub use error::{AuthError, ForbiddenReason};
pub use extractor::{CredentialBundle, CredentialNames, parse_cookies};
pub use identity::{
    CredentialInfo, Identity, IdentityKind, IdentityView, LOCAL_NETWORK_NAME, SessionSource,
    UserInfo,
};
pub use mode::{AuthMode, ModeSetting};
pub use network::{CidrBlock, NetworkClassifier, TrustedNetworks, get_client_ip};
pub use store::{ApiKeyStore, SessionStore};
pub use user_store::{
    DEFAULT_SESSION_TTL_DAYS, UserStore, expiry_after_days, generate_session_token,
    user_record_id,
};
