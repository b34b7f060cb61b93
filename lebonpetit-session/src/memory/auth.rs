//! InMemoryAuthBackend — credential store, JWT sessions, change broadcast
//!
//! Passwords are hashed with Argon2, access tokens are HS256 JWTs, and
//! revoked tokens are tracked by SHA-256 digest.

use std::collections::{HashMap, HashSet};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{Session, SessionChange, SessionEvent, SignUpMetadata, SignUpOutcome};
use crate::backend::{AuthBackend, SessionSubscription};
use crate::config::BackendConfig;
use crate::error::{Result, SessionError};

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user_id)
    pub sub: String,
    pub email: String,
    /// Token id, unique per issuance
    pub jti: String,
    /// Expiry (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    email: String,
    password_hash: String,
    metadata: Map<String, Value>,
    confirmed: bool,
}

/// In-process auth backend
pub struct InMemoryAuthBackend {
    config: BackendConfig,
    argon2_memory_kib: u32,
    accounts: RwLock<HashMap<String, Account>>,
    current: RwLock<Option<Session>>,
    revoked: RwLock<HashSet<String>>,
    subscribers: Mutex<Vec<mpsc::Sender<SessionChange>>>,
    offline: RwLock<bool>,
}

impl InMemoryAuthBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            argon2_memory_kib: Params::DEFAULT_M_COST,
            accounts: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            revoked: RwLock::new(HashSet::new()),
            subscribers: Mutex::new(Vec::new()),
            offline: RwLock::new(false),
        }
    }

    /// Lower the Argon2 memory cost (tests, local development)
    pub fn with_argon2_memory_kib(mut self, kib: u32) -> Self {
        self.argon2_memory_kib = kib;
        self
    }

    /// Simulate a network outage: every call fails with `Backend`
    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    /// Mark an account confirmed so it can sign in
    pub fn confirm_email(&self, email: &str) -> Result<()> {
        let mut accounts = self.accounts.write();
        let account = accounts
            .get_mut(&email.to_lowercase())
            .ok_or_else(|| SessionError::AuthenticationFailed(format!("Unknown account: {email}")))?;
        account.confirmed = true;
        info!(user_id = %account.user_id, "Email confirmed");
        Ok(())
    }

    /// Re-issue the current session's token and broadcast `TokenRefreshed`
    pub async fn refresh_session(&self) -> Result<Session> {
        self.check_online()?;
        let current = self.current.read().clone().ok_or(SessionError::NoSession)?;
        let refreshed = self.issue_session(&current.user_id, &current.email, current.user_metadata.clone())?;
        self.revoke(&current.access_token);
        *self.current.write() = Some(refreshed.clone());
        self.emit(SessionChange::new(SessionEvent::TokenRefreshed, Some(refreshed.clone())))
            .await;
        Ok(refreshed)
    }

    /// Backend-side invalidation (expiry, admin revoke) of the current session
    pub async fn expire_session(&self) {
        let previous = self.current.write().take();
        if let Some(session) = previous {
            self.revoke(&session.access_token);
            info!(user_id = %session.user_id, "Session expired");
        }
        self.emit(SessionChange::new(SessionEvent::SignedOut, None)).await;
    }

    /// Decode an access token and reject revoked ones
    pub fn verify_token(&self, token: &str) -> Result<AccessClaims> {
        if self.revoked.read().contains(&token_digest(token)) {
            return Err(SessionError::TokenInvalid("revoked".into()));
        }
        let claims = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )?
        .claims;
        Ok(claims)
    }

    /// Deliver a change to every live subscription, pruning closed ones
    pub async fn emit(&self, change: SessionChange) {
        let subscribers: Vec<_> = self.subscribers.lock().clone();
        for tx in &subscribers {
            if tx.send(change.clone()).await.is_err() {
                debug!("Subscriber gone");
            }
        }
        self.subscribers.lock().retain(|tx| !tx.is_closed());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().iter().filter(|tx| !tx.is_closed()).count()
    }

    pub fn user_id_for(&self, email: &str) -> Option<String> {
        self.accounts
            .read()
            .get(&email.to_lowercase())
            .map(|a| a.user_id.clone())
    }

    // ─── Helpers ───

    fn check_online(&self) -> Result<()> {
        if *self.offline.read() {
            return Err(SessionError::Backend("auth backend unreachable".into()));
        }
        Ok(())
    }

    fn hasher(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            self.argon2_memory_kib,
            Params::DEFAULT_T_COST,
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|e| SessionError::Config(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn issue_session(&self, user_id: &str, email: &str, metadata: Map<String, Value>) -> Result<Session> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(i64::from(self.config.session_ttl_hours));
        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )?;

        Ok(Session {
            user_id: user_id.to_string(),
            email: email.to_string(),
            access_token,
            expires_at,
            user_metadata: metadata,
        })
    }

    fn revoke(&self, token: &str) {
        self.revoked.write().insert(token_digest(token));
    }
}

impl Default for InMemoryAuthBackend {
    fn default() -> Self {
        Self::new(BackendConfig::default())
    }
}

#[async_trait]
impl AuthBackend for InMemoryAuthBackend {
    async fn current_session(&self) -> Result<Option<Session>> {
        self.check_online()?;
        Ok(self.current.read().clone().filter(|s| !s.is_expired()))
    }

    fn on_session_change(&self, capacity: usize) -> SessionSubscription {
        let (tx, subscription) = SessionSubscription::channel(capacity);
        self.subscribers.lock().push(tx);
        subscription
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<SignUpOutcome> {
        self.check_online()?;

        if !email.contains('@') {
            return Err(SessionError::AuthenticationFailed("Invalid email address".into()));
        }
        if password.len() < self.config.min_password_len {
            return Err(SessionError::PasswordTooWeak(format!(
                "Password must be at least {} characters",
                self.config.min_password_len
            )));
        }

        let key = email.to_lowercase();
        if self.accounts.read().contains_key(&key) {
            return Err(SessionError::UserAlreadyRegistered(email.to_string()));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .hasher()?
            .hash_password(password.as_bytes(), &salt)?
            .to_string();

        let account = Account {
            user_id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash,
            metadata: metadata.to_json(),
            confirmed: !self.config.confirm_email_required,
        };
        let user_id = account.user_id.clone();

        {
            let mut accounts = self.accounts.write();
            if accounts.contains_key(&key) {
                return Err(SessionError::UserAlreadyRegistered(email.to_string()));
            }
            accounts.insert(key, account.clone());
        }
        info!(user_id = %user_id, "Account registered");

        if !account.confirmed {
            return Ok(SignUpOutcome { user_id: Some(user_id), session: None });
        }

        let session = self.issue_session(&account.user_id, &account.email, account.metadata)?;
        *self.current.write() = Some(session.clone());
        self.emit(SessionChange::new(SessionEvent::SignedIn, Some(session.clone())))
            .await;

        Ok(SignUpOutcome { user_id: Some(user_id), session: Some(session) })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        self.check_online()?;

        let account = self
            .accounts
            .read()
            .get(&email.to_lowercase())
            .cloned()
            .ok_or(SessionError::InvalidCredentials)?;

        let parsed = PasswordHash::new(&account.password_hash)?;
        self.hasher()?
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| SessionError::InvalidCredentials)?;

        if !account.confirmed {
            return Err(SessionError::AuthenticationFailed("Email not confirmed".into()));
        }

        let session = self.issue_session(&account.user_id, &account.email, account.metadata)?;
        let previous = self.current.write().replace(session.clone());
        if let Some(previous) = previous {
            self.revoke(&previous.access_token);
        }

        info!(user_id = %session.user_id, "Sign-in successful");
        self.emit(SessionChange::new(SessionEvent::SignedIn, Some(session.clone())))
            .await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        self.check_online()?;
        let previous = self.current.write().take();
        match previous {
            Some(session) => {
                self.revoke(&session.access_token);
                info!(user_id = %session.user_id, "Session revoked");
            }
            None => warn!("Sign-out without an active session"),
        }
        self.emit(SessionChange::new(SessionEvent::SignedOut, None)).await;
        Ok(())
    }
}

fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}
