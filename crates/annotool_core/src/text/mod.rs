//! Text helpers that operate on immutable document content.
//!
//! # See also
//! - `span` for offset validation and context windows.

pub mod span;
