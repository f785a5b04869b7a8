//! Label relationship graph service.
//!
//! # Invariants
//! - No self-loops; each ordered `(source, target)` pair exists at most once.
//! - `A -> B` and `B -> A` are independent edges.
//! - Endpoints are fixed at creation; only the description is mutable.

use crate::model::label::{normalize_description, LabelCount, LabelId, DESCRIPTION_MAX_CHARS};
use crate::model::relationship::{
    EdgeDirection, LabelRelationship, NewRelationship, RelationshipId,
};
use crate::repo::relationship_repo::RelationshipRepository;
use crate::repo::{EntityKind, RepoError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from relationship graph operations.
#[derive(Debug)]
pub enum RelationshipServiceError {
    SelfRelationship(LabelId),
    DuplicateRelationship { source: LabelId, target: LabelId },
    LabelNotFound(LabelId),
    RelationshipNotFound(RelationshipId),
    DescriptionTooLong { max_chars: usize },
    Repo(RepoError),
}

impl RelationshipServiceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SelfRelationship(_) => "self_relationship",
            Self::DuplicateRelationship { .. } => "duplicate_relationship",
            Self::LabelNotFound(_) => "label_not_found",
            Self::RelationshipNotFound(_) => "relationship_not_found",
            Self::DescriptionTooLong { .. } => "description_too_long",
            Self::Repo(_) => "repo_error",
        }
    }
}

impl Display for RelationshipServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfRelationship(id) => {
                write!(f, "label cannot relate to itself: {id}")
            }
            Self::DuplicateRelationship { source, target } => {
                write!(f, "relationship already exists: {source} -> {target}")
            }
            Self::LabelNotFound(id) => write!(f, "label not found: {id}"),
            Self::RelationshipNotFound(id) => write!(f, "relationship not found: {id}"),
            Self::DescriptionTooLong { max_chars } => {
                write!(f, "description must be at most {max_chars} characters")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RelationshipServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for RelationshipServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: EntityKind::Relationship,
                id,
            } => Self::RelationshipNotFound(id),
            RepoError::NotFound {
                entity: EntityKind::Label,
                id,
            } => Self::LabelNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Relationship graph service facade.
pub struct RelationshipService<R: RelationshipRepository> {
    repo: R,
}

impl<R: RelationshipRepository> RelationshipService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Adds a directed edge `source -> target`.
    pub fn create(
        &self,
        source: LabelId,
        target: LabelId,
        description: Option<String>,
    ) -> Result<LabelRelationship, RelationshipServiceError> {
        let description = checked_description(description);
        let result: Result<LabelRelationship, RelationshipServiceError> =
            self.repo.write_scope(|| {
                if source == target {
                    return Err(RelationshipServiceError::SelfRelationship(source));
                }
                let description = description?;
                for label in [source, target] {
                    if !self.repo.label_exists(label)? {
                        return Err(RelationshipServiceError::LabelNotFound(label));
                    }
                }
                if self.repo.find_by_pair(source, target)?.is_some() {
                    return Err(RelationshipServiceError::DuplicateRelationship { source, target });
                }
                let draft = NewRelationship::new(source, target, description);
                Ok(self.repo.insert_relationship(&draft)?)
            });
        match &result {
            Ok(edge) => info!(
                "event=relationship_create module=relationship_service status=ok relationship_uuid={} source_uuid={source} target_uuid={target}",
                edge.uuid
            ),
            Err(err) => log_rejected("relationship_create", err),
        }
        result
    }

    /// Replaces the description; `None` clears it.
    pub fn update(
        &self,
        id: RelationshipId,
        description: Option<String>,
    ) -> Result<LabelRelationship, RelationshipServiceError> {
        let description = checked_description(description);
        let result: Result<LabelRelationship, RelationshipServiceError> =
            self.repo.write_scope(|| {
                let description = description?;
                self.require(id)?;
                self.repo.update_description(id, description.as_deref())?;
                self.require(id)
            });
        match &result {
            Ok(_) => info!(
                "event=relationship_update module=relationship_service status=ok relationship_uuid={id}"
            ),
            Err(err) => log_rejected("relationship_update", err),
        }
        result
    }

    pub fn delete(&self, id: RelationshipId) -> Result<(), RelationshipServiceError> {
        let result: Result<(), RelationshipServiceError> =
            self.repo.write_scope(|| Ok(self.repo.delete_relationship(id)?));
        match &result {
            Ok(()) => info!(
                "event=relationship_delete module=relationship_service status=ok relationship_uuid={id}"
            ),
            Err(err) => log_rejected("relationship_delete", err),
        }
        result
    }

    pub fn get(
        &self,
        id: RelationshipId,
    ) -> Result<Option<LabelRelationship>, RelationshipServiceError> {
        Ok(self.repo.get_relationship(id)?)
    }

    pub fn list_all(&self) -> Result<Vec<LabelRelationship>, RelationshipServiceError> {
        Ok(self.repo.list_relationships()?)
    }

    pub fn count(&self) -> Result<u64, RelationshipServiceError> {
        Ok(self.repo.count_relationships()?)
    }

    /// Outgoing plus incoming edges of one label.
    pub fn for_label(
        &self,
        label: LabelId,
    ) -> Result<Vec<LabelRelationship>, RelationshipServiceError> {
        self.require_label(label)?;
        Ok(self.repo.for_label(label)?)
    }

    pub fn outgoing(
        &self,
        label: LabelId,
    ) -> Result<Vec<LabelRelationship>, RelationshipServiceError> {
        self.require_label(label)?;
        Ok(self.repo.outgoing(label)?)
    }

    pub fn incoming(
        &self,
        label: LabelId,
    ) -> Result<Vec<LabelRelationship>, RelationshipServiceError> {
        self.require_label(label)?;
        Ok(self.repo.incoming(label)?)
    }

    /// Labels ranked by out-degree or in-degree. Labels without edges in
    /// that direction are left out.
    pub fn most_connected(
        &self,
        direction: EdgeDirection,
        limit: usize,
    ) -> Result<Vec<LabelCount>, RelationshipServiceError> {
        Ok(self.repo.most_connected(direction, limit)?)
    }

    fn require(&self, id: RelationshipId) -> Result<LabelRelationship, RelationshipServiceError> {
        self.repo
            .get_relationship(id)?
            .ok_or(RelationshipServiceError::RelationshipNotFound(id))
    }

    fn require_label(&self, id: LabelId) -> Result<(), RelationshipServiceError> {
        if self.repo.label_exists(id)? {
            Ok(())
        } else {
            Err(RelationshipServiceError::LabelNotFound(id))
        }
    }
}

fn checked_description(
    description: Option<String>,
) -> Result<Option<String>, RelationshipServiceError> {
    let description = normalize_description(description);
    match &description {
        Some(value) if value.chars().count() > DESCRIPTION_MAX_CHARS => {
            Err(RelationshipServiceError::DescriptionTooLong {
                max_chars: DESCRIPTION_MAX_CHARS,
            })
        }
        _ => Ok(description),
    }
}

fn log_rejected(event: &str, err: &RelationshipServiceError) {
    match err {
        RelationshipServiceError::Repo(inner) => error!(
            "event={event} module=relationship_service status=error error_code={} error={inner}",
            err.code()
        ),
        _ => warn!(
            "event={event} module=relationship_service status=rejected error_code={}",
            err.code()
        ),
    }
}
