//! Authentication and authorization failures.

use std::fmt;

use http::StatusCode;

/// Why the admin gate refused a request.
///
/// Only ever logged. Callers see the same response for every reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenReason {
    /// The active mode has no notion of administrators.
    AdminUnavailableInMode,
    /// The identity did not come from a user session.
    NotSessionIdentity,
    /// The session user is not an administrator.
    NotAdministrator,
}

impl ForbiddenReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdminUnavailableInMode => "admin requires full or smart mode",
            Self::NotSessionIdentity => "admin requires a user session",
            Self::NotAdministrator => "user is not an administrator",
        }
    }
}

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The mode requires an API key and none was supplied
    MissingCredential,
    /// An API key was supplied but did not validate
    InvalidCredential,
    /// Every applicable credential source was absent or invalid
    Unauthenticated,
    /// Authenticated, but not allowed
    Forbidden(ForbiddenReason),
    /// The configured mode is not one we know
    InvalidConfiguration(String),
}

impl AuthError {
    /// HTTP status the transport layer should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredential | Self::InvalidCredential | Self::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Scheme advertised in `WWW-Authenticate`, if any.
    pub fn www_authenticate(&self) -> Option<&'static str> {
        match self {
            Self::MissingCredential | Self::InvalidCredential => Some("ApiKey"),
            Self::Unauthenticated => Some("Bearer"),
            Self::Forbidden(_) | Self::InvalidConfiguration(_) => None,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential => {
                write!(f, "Missing API key. Please provide X-API-Key header.")
            }
            Self::InvalidCredential => write!(f, "Invalid or expired API key"),
            Self::Unauthenticated => write!(
                f,
                "Authentication required. Provide either X-API-Key header or valid session."
            ),
            Self::Forbidden(_) => write!(f, "Admin access required"),
            Self::InvalidConfiguration(_) => write!(f, "Authentication is misconfigured"),
        }
    }
}

impl std::error::Error for AuthError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::MissingCredential.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidCredential.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::Forbidden(ForbiddenReason::NotAdministrator).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::InvalidConfiguration("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_www_authenticate_scheme() {
        assert_eq!(AuthError::MissingCredential.www_authenticate(), Some("ApiKey"));
        assert_eq!(AuthError::InvalidCredential.www_authenticate(), Some("ApiKey"));
        assert_eq!(AuthError::Unauthenticated.www_authenticate(), Some("Bearer"));
        assert_eq!(
            AuthError::Forbidden(ForbiddenReason::NotSessionIdentity).www_authenticate(),
            None
        );
        assert_eq!(
            AuthError::InvalidConfiguration("x".into()).www_authenticate(),
            None
        );
    }

    #[test]
    fn test_forbidden_display_hides_reason() {
        let a = AuthError::Forbidden(ForbiddenReason::NotSessionIdentity).to_string();
        let b = AuthError::Forbidden(ForbiddenReason::NotAdministrator).to_string();
        let c = AuthError::Forbidden(ForbiddenReason::AdminUnavailableInMode).to_string();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_invalid_configuration_display_hides_value() {
        let err = AuthError::InvalidConfiguration("paranoid".into());
        assert!(!err.to_string().contains("paranoid"));
    }
}
