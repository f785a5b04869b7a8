//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define one use-case oriented data access contract per store.
//! - Keep SQL details out of the services that enforce invariants.
//!
//! # Invariants
//! - Repositories return semantic `NotFound` errors for missing write
//!   targets in addition to transport errors.
//! - Repositories never open transactions of their own; services wrap each
//!   mutation in [`WriteScope::write_scope`].

pub mod annotation_repo;
pub mod document_repo;
pub mod error;
pub mod label_repo;
pub mod relationship_repo;
pub(crate) mod support;

pub use error::{EntityKind, RepoError, RepoResult};

/// Serialization boundary for one service mutation.
pub trait WriteScope {
    /// Runs `op` atomically: every read and write it performs through this
    /// repository commits together or not at all.
    fn write_scope<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>;
}
