//! Directed label relationship model.
//!
//! # Invariants
//! - `source_uuid != target_uuid`.
//! - `(source_uuid, target_uuid)` is unique; the reverse pair is a distinct
//!   edge.
//! - Endpoints are immutable after creation; only `description` changes.

use crate::model::label::LabelId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable relationship identifier.
pub type RelationshipId = Uuid;

/// Persisted relationship read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRelationship {
    pub uuid: RelationshipId,
    pub source_uuid: LabelId,
    pub target_uuid: LabelId,
    pub description: Option<String>,
    /// Epoch ms.
    pub created_at: i64,
}

/// Edge direction relative to one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    /// Label is the source.
    Outgoing,
    /// Label is the target.
    Incoming,
}

/// Insert input for one relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelationship {
    pub uuid: RelationshipId,
    pub source_uuid: LabelId,
    pub target_uuid: LabelId,
    pub description: Option<String>,
}

impl NewRelationship {
    /// Builds an insert draft with a fresh id.
    pub fn new(source_uuid: LabelId, target_uuid: LabelId, description: Option<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            source_uuid,
            target_uuid,
            description,
        }
    }
}
