//! SessionActor — Tokio actor owning the current identity
//!
//! The actor owns `ManagerState` and applies every mutation itself, one
//! message at a time. Backend session changes are drained before mailbox
//! commands, so a change emitted before a local command is applied first.
//! Profile resolutions run as separate tasks and post their result back;
//! each carries the generation it was started under and is discarded if a
//! newer session change, sign-out, or refresh happened meanwhile.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lebonpetit_session::auth::Role;
//! use lebonpetit_session::memory::{InMemoryAuthBackend, InMemoryProfileStore};
//! use lebonpetit_session::{ManagerConfig, SessionActor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth = Arc::new(InMemoryAuthBackend::default());
//!     let store = Arc::new(InMemoryProfileStore::new());
//!     let handle = SessionActor::spawn(auth, store, ManagerConfig::new()).await;
//!
//!     handle
//!         .sign_up("amina@mail.cm", "secret-pass", "Amina", "690000000", Role::Tenant)
//!         .await?;
//!
//!     // Resolution is driven by the session-change stream
//!     let state = handle.wait_until(|s| s.user.is_some()).await;
//!     assert!(!state.loading);
//!
//!     handle.sign_out().await?;
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::auth::{
    add_months, NewProfile, Profile, ProfileUpdate, Role, Session, SessionChange, SessionEvent,
    SignUpMetadata, SubscriptionStatus,
};
use crate::backend::{AuthBackend, ProfileStore, SessionSubscription};
use crate::config::ManagerConfig;
use crate::error::{Result, SessionError};

use super::ManagerState;

// ─── Actor Messages ───

enum ManagerMsg {
    Resolved {
        generation: u64,
        user_id: String,
        profile: Option<Profile>,
    },
    SignedOut {
        reply: oneshot::Sender<()>,
    },
    Refresh {
        reply: oneshot::Sender<Result<()>>,
    },
    MergeProfile {
        user_id: String,
        update: ProfileUpdate,
        reply: oneshot::Sender<bool>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ─── Actor ───

/// Session & profile actor — one instance per running client
pub struct SessionActor {
    auth: Arc<dyn AuthBackend>,
    store: Arc<dyn ProfileStore>,
    config: Arc<ManagerConfig>,
    state: watch::Sender<ManagerState>,
    generation: u64,
    live: Arc<AtomicBool>,
    mailbox: mpsc::WeakSender<ManagerMsg>,
    rx: mpsc::Receiver<ManagerMsg>,
    subscription: Option<SessionSubscription>,
    /// Updates merged while a resolution was in flight, re-applied to its result
    pending_merges: Vec<(String, ProfileUpdate)>,
}

impl SessionActor {
    /// Spawn the actor and return a handle for the presentation layer
    ///
    /// Registers on the session-change stream, then feeds the current
    /// session (if any) through the same resolution path as later events.
    pub async fn spawn(
        auth: Arc<dyn AuthBackend>,
        store: Arc<dyn ProfileStore>,
        config: ManagerConfig,
    ) -> SessionHandle {
        let config = Arc::new(config);
        let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
        let (state, state_rx) = watch::channel(ManagerState::starting());

        let subscription = auth.on_session_change(config.event_capacity);
        let initial = match auth.current_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Initial session query failed, starting signed out");
                None
            }
        };

        let mut actor = Self {
            auth: Arc::clone(&auth),
            store: Arc::clone(&store),
            config: Arc::clone(&config),
            state,
            generation: 0,
            live: Arc::new(AtomicBool::new(true)),
            mailbox: tx.downgrade(),
            rx,
            subscription: Some(subscription),
            pending_merges: Vec::new(),
        };

        actor.handle_change(SessionChange::new(SessionEvent::InitialSession, initial));

        tokio::spawn(actor.run());
        info!("SessionActor spawned");

        SessionHandle {
            tx,
            state: state_rx,
            auth,
            store,
            config,
        }
    }

    /// Main event loop
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                change = next_change(&mut self.subscription) => match change {
                    Some(change) => self.handle_change(change),
                    None => {
                        warn!("Session-change stream closed by backend");
                        self.subscription = None;
                    }
                },
                msg = self.rx.recv() => match msg {
                    Some(msg) => {
                        if !self.handle_msg(msg) {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        self.stop();
        info!("SessionActor stopped");
    }

    /// Returns false once the actor should stop
    fn handle_msg(&mut self, msg: ManagerMsg) -> bool {
        match msg {
            ManagerMsg::Resolved { generation, user_id, profile } => {
                self.handle_resolved(generation, &user_id, profile);
            }
            ManagerMsg::SignedOut { reply } => {
                self.clear("local sign-out");
                let _ = reply.send(());
            }
            ManagerMsg::Refresh { reply } => {
                let _ = reply.send(self.handle_refresh());
            }
            ManagerMsg::MergeProfile { user_id, update, reply } => {
                let _ = reply.send(self.handle_merge(&user_id, &update));
            }
            ManagerMsg::Shutdown { reply } => {
                self.stop();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    // ─── Handler Implementations ───

    fn handle_change(&mut self, change: SessionChange) {
        debug!(event = ?change.event, "Session change");
        match change.session {
            None => self.clear("session ended"),
            Some(session) => self.begin_resolution(session),
        }
    }

    fn begin_resolution(&mut self, session: Session) {
        self.generation += 1;
        let generation = self.generation;

        self.pending_merges.retain(|(id, _)| *id == session.user_id);
        self.state.send_modify(|s| {
            if s.user.as_ref().is_some_and(|u| u.id != session.user_id) {
                s.user = None;
            }
            s.session = Some(session.clone());
            s.loading = true;
        });

        let resolution = Resolution {
            auth: Arc::clone(&self.auth),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            live: Arc::clone(&self.live),
            mailbox: self.mailbox.clone(),
            generation,
        };
        tokio::spawn(resolution.run(session));
    }

    fn handle_resolved(&mut self, generation: u64, user_id: &str, profile: Option<Profile>) {
        if generation != self.generation {
            debug!(generation, current = self.generation, user_id, "Discarding stale resolution");
            return;
        }
        let pending = std::mem::take(&mut self.pending_merges);
        let profile = profile.map(|mut p| {
            for (id, update) in &pending {
                if *id == p.id {
                    debug!(user_id = %id, "Re-applying profile update over resolved row");
                    p.apply(update);
                }
            }
            p
        });
        match &profile {
            Some(p) => info!(user_id, role = %p.role, status = %p.status, "Profile resolved"),
            None => warn!(user_id, "Profile unavailable, treating user as signed out"),
        }
        self.state.send_modify(|s| {
            s.user = profile;
            s.loading = false;
        });
    }

    fn handle_refresh(&mut self) -> Result<()> {
        let session = self.state.borrow().session.clone();
        let session = session.ok_or(SessionError::NoSession)?;
        self.begin_resolution(session);
        Ok(())
    }

    fn handle_merge(&mut self, user_id: &str, update: &ProfileUpdate) -> bool {
        // A resolution in flight may have read the row before this update
        let in_flight = {
            let s = self.state.borrow();
            s.loading && s.session.as_ref().is_some_and(|x| x.user_id == user_id)
        };
        if in_flight {
            self.pending_merges.push((user_id.to_string(), update.clone()));
        }

        let merged = self.state.send_if_modified(|s| match s.user.as_mut() {
            Some(user) if user.id == user_id => {
                user.apply(update);
                true
            }
            _ => false,
        });
        merged || in_flight
    }

    fn clear(&mut self, reason: &str) {
        self.generation += 1;
        self.pending_merges.clear();
        self.state.send_modify(|s| {
            s.user = None;
            s.session = None;
            s.loading = false;
        });
        info!(reason, "Session cleared");
    }

    fn stop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

/// Next backend change; never resolves once the stream is gone
async fn next_change(subscription: &mut Option<SessionSubscription>) -> Option<SessionChange> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

// ─── Resolution ───

/// One in-flight profile resolution
struct Resolution {
    auth: Arc<dyn AuthBackend>,
    store: Arc<dyn ProfileStore>,
    config: Arc<ManagerConfig>,
    live: Arc<AtomicBool>,
    mailbox: mpsc::WeakSender<ManagerMsg>,
    generation: u64,
}

impl Resolution {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn run(self, session: Session) {
        if !self.is_live() {
            return;
        }

        let profile = match self.resolve(&session).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(user_id = %session.user_id, error = %e, "Profile resolution failed");
                None
            }
        };

        if !self.is_live() {
            debug!(user_id = %session.user_id, "Manager torn down, dropping resolution");
            return;
        }
        let Some(tx) = self.mailbox.upgrade() else { return };
        let _ = tx
            .send(ManagerMsg::Resolved {
                generation: self.generation,
                user_id: session.user_id,
                profile,
            })
            .await;
    }

    async fn resolve(&self, session: &Session) -> Result<Profile> {
        match self.store.find_by_user_id(&session.user_id).await {
            Ok(profile) => Ok(profile),
            Err(e) if e.is_not_found() => self.bootstrap(session).await,
            Err(e) => Err(e),
        }
    }

    /// Create the missing profile from signup metadata
    async fn bootstrap(&self, session: &Session) -> Result<Profile> {
        if !self.is_live() {
            return Err(SessionError::ManagerUnavailable("torn down before bootstrap".into()));
        }

        let metadata = match self.auth.current_session().await {
            Ok(Some(current)) if current.user_id == session.user_id => current.metadata(),
            Ok(_) => session.metadata(),
            Err(e) => {
                debug!(error = %e, "Session re-fetch failed, using event metadata");
                session.metadata()
            }
        };

        let role = metadata.declared_role().unwrap_or(self.config.default_role);
        let name = metadata.display_name(&session.email, &self.config.placeholder_name);
        let row = NewProfile::for_role(
            session.user_id.clone(),
            session.email.clone(),
            name,
            metadata.phone.clone(),
            role,
        );

        if !self.is_live() {
            return Err(SessionError::ManagerUnavailable("torn down before bootstrap".into()));
        }

        match self.store.insert(row).await {
            Ok(profile) => {
                info!(user_id = %profile.id, role = %profile.role, "Profile bootstrapped");
                Ok(profile)
            }
            Err(SessionError::Conflict(_)) => {
                debug!(user_id = %session.user_id, "Profile created concurrently, re-fetching");
                self.store.find_by_user_id(&session.user_id).await
            }
            Err(e) => Err(e),
        }
    }
}

// ─── Handle (client-facing API) ───

/// Cloneable handle to the SessionActor
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<ManagerMsg>,
    state: watch::Receiver<ManagerState>,
    auth: Arc<dyn AuthBackend>,
    store: Arc<dyn ProfileStore>,
    config: Arc<ManagerConfig>,
}

impl SessionHandle {
    // ─── Reactive state ───

    pub fn state(&self) -> ManagerState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<Profile> {
        self.state.borrow().user.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    /// While true, `user` must not be trusted
    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Receiver notified on every state change
    pub fn watch(&self) -> watch::Receiver<ManagerState> {
        self.state.clone()
    }

    /// Wait until `predicate` holds; returns the last state if the actor stops
    pub async fn wait_until(&self, mut predicate: impl FnMut(&ManagerState) -> bool) -> ManagerState {
        let mut rx = self.state.clone();
        if let Ok(state) = rx.wait_for(|s| predicate(s)).await {
            return state.clone();
        }
        let last = rx.borrow().clone();
        last
    }

    /// Wait until no resolution is in flight
    pub async fn settled(&self) -> ManagerState {
        self.wait_until(|s| !s.loading).await
    }

    // ─── Operations ───

    /// Register a new account with its metadata, then create its profile
    ///
    /// Profile and subscription inserts are best-effort: failures are logged
    /// and the bootstrap path recovers the profile on the next session.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        phone: &str,
        role: Role,
    ) -> Result<()> {
        let metadata = SignUpMetadata::new(name, phone, role);
        let outcome = self.auth.sign_up(email, password, metadata.clone()).await.map_err(|e| {
            warn!(error = %e, "Sign-up failed");
            e
        })?;

        let Some(user_id) = outcome.user_id else {
            info!("Sign-up accepted, awaiting confirmation");
            return Ok(());
        };

        let display_name = metadata.display_name(email, &self.config.placeholder_name);
        let row = NewProfile::for_role(user_id.clone(), email, display_name, metadata.phone, role);
        if let Err(e) = self.store.insert(row).await {
            warn!(user_id = %user_id, error = %e, "Profile insert after sign-up failed");
        }

        if role == Role::Tenant {
            let start = Utc::now();
            let end = add_months(start, self.config.subscription_months);
            if let Err(e) = self
                .store
                .insert_subscription(&user_id, start, end, SubscriptionStatus::Pending)
                .await
            {
                warn!(user_id = %user_id, error = %e, "Tenant subscription insert failed");
            }
        }

        info!(user_id = %user_id, role = %role, "Sign-up complete");
        Ok(())
    }

    /// Verify credentials; the session-change stream populates `user`
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        match self.auth.sign_in_with_password(email, password).await {
            Ok(session) => {
                info!(user_id = %session.user_id, "Sign-in accepted");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                Err(e)
            }
        }
    }

    /// Clear local state, then invalidate the backend session
    ///
    /// Local state is cleared before the backend is contacted; a failed or
    /// hung backend call never keeps the user signed in locally.
    pub async fn sign_out(&self) -> Result<()> {
        let cleared = self.clear_local().await;
        if let Err(e) = self.auth.sign_out().await {
            warn!(error = %e, "Backend sign-out failed, local state already cleared");
        }
        cleared
    }

    async fn clear_local(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ManagerMsg::SignedOut { reply })
            .await
            .map_err(|_| SessionError::ManagerUnavailable("SessionActor".into()))?;
        rx.await
            .map_err(|_| SessionError::ManagerUnavailable("SessionActor dropped".into()))
    }

    /// Persist partial fields, then merge them into the in-memory profile
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<()> {
        let current = self.user().ok_or(SessionError::NoSession)?;

        self.store.update(&current.id, &update).await.map_err(|e| {
            warn!(user_id = %current.id, error = %e, "Profile update failed");
            e
        })?;

        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ManagerMsg::MergeProfile { user_id: current.id.clone(), update, reply })
            .await
            .map_err(|_| SessionError::ManagerUnavailable("SessionActor".into()))?;
        let merged = rx
            .await
            .map_err(|_| SessionError::ManagerUnavailable("SessionActor dropped".into()))?;
        if !merged {
            debug!(user_id = %current.id, "Profile changed before merge, local state left as is");
        }
        Ok(())
    }

    /// Re-run profile resolution for the cached session
    pub async fn refresh(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ManagerMsg::Refresh { reply })
            .await
            .map_err(|_| SessionError::ManagerUnavailable("SessionActor".into()))?;
        rx.await
            .map_err(|_| SessionError::ManagerUnavailable("SessionActor dropped".into()))?
    }

    /// Unregister from the session stream and stop the actor
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(ManagerMsg::Shutdown { reply }).await.is_err() {
            return;
        }
        let _ = rx.await;
    }
}
