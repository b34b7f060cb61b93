//! InMemoryProfileStore — profile rows with a unique-id constraint

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::auth::{NewProfile, Profile, ProfileUpdate, SubscriptionRecord, SubscriptionStatus};
use crate::backend::ProfileStore;
use crate::error::{Result, SessionError};

#[derive(Debug, Default)]
struct Faults {
    lookup: Option<SessionError>,
    insert: Option<SessionError>,
    update: Option<SessionError>,
    subscription: Option<SessionError>,
}

/// In-process profile store
///
/// Faults stay armed until [`clear_faults`](Self::clear_faults); lookups can
/// be held open with [`pause_lookups`](Self::pause_lookups) to keep a
/// resolution in flight, or released only after the row has been read with
/// [`hold_lookup_results`](Self::hold_lookup_results).
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, Profile>>,
    subscriptions: RwLock<Vec<SubscriptionRecord>>,
    faults: Mutex<Faults>,
    lookup_gate: watch::Sender<bool>,
    result_gate: watch::Sender<bool>,
    reads: AtomicUsize,
    lookups: AtomicUsize,
    inserts: AtomicUsize,
    updates: AtomicUsize,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        let (lookup_gate, _) = watch::channel(true);
        let (result_gate, _) = watch::channel(true);
        Self {
            profiles: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(Vec::new()),
            faults: Mutex::new(Faults::default()),
            lookup_gate,
            result_gate,
            reads: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
            inserts: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        }
    }

    /// Insert a row directly, bypassing faults and counters
    pub fn seed(&self, profile: Profile) {
        self.profiles.write().insert(profile.id.clone(), profile);
    }

    pub fn get(&self, user_id: &str) -> Option<Profile> {
        self.profiles.read().get(user_id).cloned()
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn subscriptions_for(&self, user_id: &str) -> Vec<SubscriptionRecord> {
        self.subscriptions
            .read()
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn fail_lookups(&self, err: SessionError) {
        self.faults.lock().lookup = Some(err);
    }

    pub fn fail_inserts(&self, err: SessionError) {
        self.faults.lock().insert = Some(err);
    }

    pub fn fail_updates(&self, err: SessionError) {
        self.faults.lock().update = Some(err);
    }

    pub fn fail_subscriptions(&self, err: SessionError) {
        self.faults.lock().subscription = Some(err);
    }

    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    pub fn pause_lookups(&self) {
        self.lookup_gate.send_replace(false);
    }

    pub fn resume_lookups(&self) {
        self.lookup_gate.send_replace(true);
    }

    /// Read the row, then wait before returning it
    pub fn hold_lookup_results(&self) {
        self.result_gate.send_replace(false);
    }

    pub fn release_lookup_results(&self) {
        self.result_gate.send_replace(true);
    }

    /// `find_by_user_id` calls that have read the row
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Completed `find_by_user_id` calls
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Profile> {
        let mut gate = self.lookup_gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(SessionError::Store("lookup gate closed".into()));
        }

        let fault = self.faults.lock().lookup.clone();
        let found = match fault {
            Some(err) => Err(err),
            None => self
                .get(user_id)
                .ok_or_else(|| SessionError::ProfileNotFound(user_id.to_string())),
        };
        self.reads.fetch_add(1, Ordering::SeqCst);

        let mut held = self.result_gate.subscribe();
        if held.wait_for(|open| *open).await.is_err() {
            return Err(SessionError::Store("result gate closed".into()));
        }
        self.lookups.fetch_add(1, Ordering::SeqCst);
        found
    }

    async fn insert(&self, profile: NewProfile) -> Result<Profile> {
        if let Some(err) = self.faults.lock().insert.clone() {
            return Err(err);
        }

        let mut profiles = self.profiles.write();
        if profiles.contains_key(&profile.id) {
            debug!(user_id = %profile.id, "Duplicate profile insert rejected");
            return Err(SessionError::Conflict(profile.id));
        }
        let record = profile.into_profile(Utc::now());
        profiles.insert(record.id.clone(), record.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);
        info!(user_id = %record.id, role = %record.role, status = %record.status, "Profile inserted");
        Ok(record)
    }

    async fn update(&self, user_id: &str, update: &ProfileUpdate) -> Result<()> {
        if let Some(err) = self.faults.lock().update.clone() {
            return Err(err);
        }

        let mut profiles = self.profiles.write();
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| SessionError::ProfileNotFound(user_id.to_string()))?;
        profile.apply(update);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn insert_subscription(
        &self,
        user_id: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        status: SubscriptionStatus,
    ) -> Result<SubscriptionRecord> {
        if let Some(err) = self.faults.lock().subscription.clone() {
            return Err(err);
        }

        let record = SubscriptionRecord::new(user_id, start_date, end_date, status);
        self.subscriptions.write().push(record.clone());
        info!(user_id, end_date = %record.end_date, "Subscription recorded");
        Ok(record)
    }
}
