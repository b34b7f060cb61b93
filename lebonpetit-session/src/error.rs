//! Error types for lebonpetit-session — Railway Programming
//!
//! All operations return `Result<T, SessionError>`.
//! No panics, no unwraps in production code paths.

use thiserror::Error;

/// Unified error type for session, auth backend, and profile store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    // ─── Profile Store Errors ───

    /// The one failure the resolution procedure recovers from (bootstrap)
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Profile already exists: {0}")]
    Conflict(String),

    #[error("Profile store error: {0}")]
    Store(String),

    // ─── Auth Errors ───

    #[error("No active session")]
    NoSession,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("User already registered: {0}")]
    UserAlreadyRegistered(String),

    #[error("Password too weak: {0}")]
    PasswordTooWeak(String),

    #[error("Token invalid: {0}")]
    TokenInvalid(String),

    // ─── Infrastructure Errors ───

    /// Network, permission, or transport failure reported by a backend
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Manager unavailable: {0}")]
    ManagerUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// True for the not-found condition that triggers a profile bootstrap
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProfileNotFound(_))
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for SessionError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        SessionError::TokenInvalid(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for SessionError {
    fn from(err: argon2::password_hash::Error) -> Self {
        SessionError::Internal(err.to_string())
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
