//! Configuration for the session manager and the in-memory backend

use crate::auth::Role;

/// Session manager configuration
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Role assigned at bootstrap when the signup metadata carries none
    pub default_role: Role,

    /// Display name used when neither metadata nor email provide one
    pub placeholder_name: String,

    /// Length of the pending subscription created for tenants, in months
    pub subscription_months: u32,

    /// Mailbox capacity of the manager actor
    pub command_capacity: usize,

    /// Buffer size for session-change events forwarded to the actor
    pub event_capacity: usize,
}

impl ManagerConfig {
    /// Create config with sensible defaults
    pub fn new() -> Self {
        Self {
            default_role: Role::Landlord,
            placeholder_name: std::env::var("LEBONPETIT_PLACEHOLDER_NAME")
                .unwrap_or_else(|_| "Utilisateur".to_string()),
            subscription_months: 1,
            command_capacity: 256,
            event_capacity: 64,
        }
    }

    /// Override the bootstrap default role
    pub fn with_default_role(mut self, role: Role) -> Self {
        self.default_role = role;
        self
    }

    /// Override the placeholder display name
    pub fn with_placeholder_name(mut self, name: impl Into<String>) -> Self {
        self.placeholder_name = name.into();
        self
    }

    /// Override the tenant subscription length
    pub fn with_subscription_months(mut self, months: u32) -> Self {
        self.subscription_months = months;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for [`InMemoryAuthBackend`](crate::memory::InMemoryAuthBackend)
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Secret for signing access tokens
    pub jwt_secret: String,

    /// Access token lifetime in hours
    pub session_ttl_hours: u32,

    /// Minimum accepted password length
    pub min_password_len: usize,

    /// When set, sign-up returns a user id but no session until confirmation
    pub confirm_email_required: bool,
}

impl BackendConfig {
    pub fn new() -> Self {
        Self {
            jwt_secret: std::env::var("LEBONPETIT_JWT_SECRET")
                .unwrap_or_else(|_| "lebonpetit-default-secret-change-me".to_string()),
            session_ttl_hours: 1,
            min_password_len: 6,
            confirm_email_required: false,
        }
    }

    /// Override JWT secret
    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = secret.into();
        self
    }

    /// Override access token lifetime
    pub fn with_session_ttl_hours(mut self, hours: u32) -> Self {
        self.session_ttl_hours = hours;
        self
    }

    /// Require email confirmation before a session is issued
    pub fn with_email_confirmation(mut self, required: bool) -> Self {
        self.confirm_email_required = required;
        self
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ManagerConfig::new();
        assert_eq!(cfg.default_role, Role::Landlord);
        assert_eq!(cfg.subscription_months, 1);
        assert_eq!(cfg.command_capacity, 256);
    }

    #[test]
    fn test_builder_pattern() {
        let cfg = ManagerConfig::new()
            .with_default_role(Role::Tenant)
            .with_placeholder_name("Client")
            .with_subscription_months(3);

        assert_eq!(cfg.default_role, Role::Tenant);
        assert_eq!(cfg.placeholder_name, "Client");
        assert_eq!(cfg.subscription_months, 3);

        let backend = BackendConfig::new()
            .with_jwt_secret("my-secret")
            .with_session_ttl_hours(24)
            .with_email_confirmation(true);

        assert_eq!(backend.jwt_secret, "my-secret");
        assert_eq!(backend.session_ttl_hours, 24);
        assert!(backend.confirm_email_required);
        assert_eq!(backend.min_password_len, 6);
    }
}
