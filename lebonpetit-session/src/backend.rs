//! Backend ports — the auth service and the profile store
//!
//! The session manager only ever talks to these traits. The hosted
//! backend-as-a-service client implements them in production;
//! [`crate::memory`] provides in-process implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::auth::{
    NewProfile, Profile, ProfileUpdate, Session, SessionChange, SignUpMetadata, SignUpOutcome,
    SubscriptionRecord, SubscriptionStatus,
};
use crate::error::Result;

/// Auth backend: session issuance, credential checks, session-change stream
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Currently valid session, if any
    async fn current_session(&self) -> Result<Option<Session>>;

    /// Register for every subsequent session change (login, logout, refresh)
    fn on_session_change(&self, capacity: usize) -> SessionSubscription;

    /// Register credentials; `metadata` travels with the registration call
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<SignUpOutcome>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    /// Best-effort session invalidation
    async fn sign_out(&self) -> Result<()>;
}

/// Profile store: point lookup, insert, update keyed by backend user id
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `Err(SessionError::ProfileNotFound)` when no row exists
    async fn find_by_user_id(&self, user_id: &str) -> Result<Profile>;

    /// `Err(SessionError::Conflict)` when a row with the same id exists
    async fn insert(&self, profile: NewProfile) -> Result<Profile>;

    async fn update(&self, user_id: &str, update: &ProfileUpdate) -> Result<()>;

    async fn insert_subscription(
        &self,
        user_id: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        status: SubscriptionStatus,
    ) -> Result<SubscriptionRecord>;
}

/// Cancellable registration on the auth backend's session-change stream
///
/// Dropping the subscription or calling [`unsubscribe`](Self::unsubscribe)
/// ends the registration; the backend stops delivering on its next send.
pub struct SessionSubscription {
    rx: mpsc::Receiver<SessionChange>,
}

impl SessionSubscription {
    pub fn new(rx: mpsc::Receiver<SessionChange>) -> Self {
        Self { rx }
    }

    /// Pair of (sender kept by the backend, subscription handed to the caller)
    pub fn channel(capacity: usize) -> (mpsc::Sender<SessionChange>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }

    /// Next change, `None` once the backend or the caller closed the stream
    pub async fn recv(&mut self) -> Option<SessionChange> {
        self.rx.recv().await
    }

    pub fn unsubscribe(&mut self) {
        self.rx.close();
    }
}
