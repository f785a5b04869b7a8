//! Domain records for the annotation core.
//!
//! # Responsibility
//! - Define canonical data structures shared by repositories and services.
//! - Provide record-level validation that does not need storage access.
//!
//! # Invariants
//! - Every record is identified by a stable UUID v4.
//! - Relations between records are stored as ids, never as object links.
//!   Ownership of parent/child and source/target edges lives in storage
//!   indices, not inside the records.

pub mod annotation;
pub mod document;
pub mod label;
pub mod relationship;
