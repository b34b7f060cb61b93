//! Session & profile manager — session lifecycle and profile bootstrap
//!
//! Observes the auth backend's session changes, resolves each session into
//! a profile (creating one on first sight), and exposes sign-up, sign-in,
//! sign-out, and profile updates with consistent state transitions.

pub mod actor;

pub use actor::{SessionActor, SessionHandle};

use crate::auth::{Profile, Session};

/// State exposed to the presentation layer
///
/// `user` is absent whenever `session` is absent. While `loading` is true a
/// resolution is in flight and `user` must not be trusted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManagerState {
    pub user: Option<Profile>,
    pub session: Option<Session>,
    pub loading: bool,
}

impl ManagerState {
    /// State before the initial session query has been processed
    pub fn starting() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.loading && self.session.is_some() && self.user.is_some()
    }
}
