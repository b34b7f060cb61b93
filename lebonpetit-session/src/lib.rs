//! # Le Bon Petit Session
//!
//! Session & profile manager for the Le Bon Petit marketplace — session
//! lifecycle, lazy profile bootstrap, and role-based state for tenants,
//! landlords, and admins.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │           Presentation layer              │
//! │   (user, session, loading + operations)   │
//! ├───────────────────────────────────────────┤
//! │  SessionHandle  ──mailbox──▶ SessionActor │
//! │                    (state, generations,   │
//! │                     profile resolution)   │
//! ├─────────────────────┬─────────────────────┤
//! │    AuthBackend      │    ProfileStore     │
//! │ (sessions, events)  │ (profiles, subs)    │
//! └─────────────────────┴─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lebonpetit_session::memory::{InMemoryAuthBackend, InMemoryProfileStore};
//! use lebonpetit_session::{ManagerConfig, SessionActor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth = Arc::new(InMemoryAuthBackend::default());
//!     let store = Arc::new(InMemoryProfileStore::new());
//!     let handle = SessionActor::spawn(auth, store, ManagerConfig::new()).await;
//!
//!     handle.sign_in("amina@mail.cm", "secret-pass").await?;
//!     let state = handle.wait_until(|s| !s.loading && s.session.is_some()).await;
//!     println!("signed in as {:?}", state.user.map(|u| u.name));
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Uniform resolution**: the startup session and every later change go
//!   through the same lookup-or-bootstrap path
//! - **Stale-result discard**: resolutions are sequenced; only the latest
//!   one may write state
//! - **Immediate sign-out**: local state clears without waiting on the backend
//! - **Railway Programming**: all operations return `Result<T, SessionError>`

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod manager;

#[cfg(feature = "memory")]
pub mod memory;

// Re-exports for convenience
pub use auth::{Profile, ProfileStatus, ProfileUpdate, Role, Session};
pub use backend::{AuthBackend, ProfileStore, SessionSubscription};
pub use config::{BackendConfig, ManagerConfig};
pub use error::{Result, SessionError};
pub use manager::{ManagerState, SessionActor, SessionHandle};

#[cfg(feature = "memory")]
pub use memory::{InMemoryAuthBackend, InMemoryProfileStore};
