//! Core use-case services.
//!
//! # Responsibility
//! - Enforce label, relationship and annotation invariants above the
//!   repositories.
//! - Wrap each mutation in one repository write scope.

pub mod analytics_service;
pub mod annotation_service;
pub mod document_service;
pub mod label_service;
pub mod label_tree;
pub mod relationship_service;
