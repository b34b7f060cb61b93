//! Authentication domain — sessions, profiles, roles, and subscriptions
//!
//! Pure data: the manager and the backends exchange these types.

pub mod types;

pub use types::{
    add_months, NewProfile, Profile, ProfileStatus, ProfileUpdate, Role, Session, SessionChange,
    SessionEvent, SignUpMetadata, SignUpOutcome, SubscriptionRecord, SubscriptionStatus,
};
