//! In-process backends for tests and local development

pub mod auth;
pub mod store;

pub use auth::{AccessClaims, InMemoryAuthBackend};
pub use store::InMemoryProfileStore;
