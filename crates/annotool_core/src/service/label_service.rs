//! Label hierarchy use-case service.
//!
//! # Responsibility
//! - Validate label records and hierarchy rules above the repository.
//! - Provide create, re-parent, rename, appearance update, delete and
//!   hierarchy queries.
//!
//! # Invariants
//! - Label names are globally unique, compared case-sensitively.
//! - The parent graph stays a forest: re-parenting never makes a label its
//!   own ancestor.
//! - A label with children or annotations cannot be deleted.
//! - Every mutation validates and writes inside one write scope.

use crate::model::label::{
    normalize_description, validate_color, validate_description, validate_name, Label,
    LabelCount, LabelId, LabelValidationError, NewLabel,
};
use crate::repo::label_repo::LabelRepository;
use crate::repo::{EntityKind, RepoError};
use crate::service::label_tree::LabelTree;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from label hierarchy operations.
#[derive(Debug)]
pub enum LabelServiceError {
    /// Name, color or description failed record validation.
    InvalidLabel(LabelValidationError),
    /// Another label already holds this exact name.
    DuplicateName(String),
    /// Target label does not exist.
    LabelNotFound(LabelId),
    /// Requested parent does not exist.
    ParentNotFound(LabelId),
    /// Label cannot be its own parent.
    SelfParent(LabelId),
    /// Parent is a descendant of the label.
    CycleDetected {
        label_uuid: LabelId,
        parent_uuid: LabelId,
    },
    /// Delete blocked by child labels.
    HasChildren {
        label_uuid: LabelId,
        child_count: u64,
    },
    /// Delete blocked by annotations.
    InUse {
        label_uuid: LabelId,
        annotation_count: u64,
    },
    /// Repository-level failure.
    Repo(RepoError),
}

impl LabelServiceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidLabel(LabelValidationError::InvalidColor(_)) => "invalid_color",
            Self::InvalidLabel(_) => "invalid_label",
            Self::DuplicateName(_) => "duplicate_name",
            Self::LabelNotFound(_) => "label_not_found",
            Self::ParentNotFound(_) => "parent_not_found",
            Self::SelfParent(_) => "self_parent",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::HasChildren { .. } => "has_children",
            Self::InUse { .. } => "label_in_use",
            Self::Repo(_) => "repo_error",
        }
    }
}

impl Display for LabelServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLabel(err) => write!(f, "{err}"),
            Self::DuplicateName(name) => write!(f, "label name already exists: `{name}`"),
            Self::LabelNotFound(id) => write!(f, "label not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent label not found: {id}"),
            Self::SelfParent(id) => write!(f, "label cannot be its own parent: {id}"),
            Self::CycleDetected {
                label_uuid,
                parent_uuid,
            } => write!(
                f,
                "re-parent would create cycle: label {label_uuid} under parent {parent_uuid}"
            ),
            Self::HasChildren {
                label_uuid,
                child_count,
            } => write!(f, "label {label_uuid} still has {child_count} child label(s)"),
            Self::InUse {
                label_uuid,
                annotation_count,
            } => write!(
                f,
                "label {label_uuid} is used by {annotation_count} annotation(s)"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LabelServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidLabel(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LabelServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: EntityKind::Label,
                id,
            } => Self::LabelNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<LabelValidationError> for LabelServiceError {
    fn from(value: LabelValidationError) -> Self {
        Self::InvalidLabel(value)
    }
}

/// Label hierarchy service facade.
pub struct LabelService<R: LabelRepository> {
    repo: R,
}

impl<R: LabelRepository> LabelService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one label, optionally under an existing parent.
    pub fn create(
        &self,
        name: impl Into<String>,
        color: impl Into<String>,
        description: Option<String>,
        parent_uuid: Option<LabelId>,
    ) -> Result<Label, LabelServiceError> {
        let draft = NewLabel::new(name, color, description, parent_uuid);
        let result: Result<Label, LabelServiceError> = self.repo.write_scope(|| {
            draft.validate()?;
            self.ensure_name_free(&draft.name, None)?;
            if let Some(parent_uuid) = parent_uuid {
                self.repo
                    .get_label(parent_uuid)?
                    .ok_or(LabelServiceError::ParentNotFound(parent_uuid))?;
            }
            Ok(self.repo.insert_label(&draft)?)
        });
        match &result {
            Ok(label) => info!(
                "event=label_create module=label_service status=ok label_uuid={} has_parent={}",
                label.uuid,
                label.parent_uuid.is_some()
            ),
            Err(err) => log_rejected("label_create", err),
        }
        result
    }

    pub fn get(&self, id: LabelId) -> Result<Option<Label>, LabelServiceError> {
        Ok(self.repo.get_label(id)?)
    }

    /// All labels in insertion order.
    pub fn list_all(&self) -> Result<Vec<Label>, LabelServiceError> {
        Ok(self.repo.list_labels()?)
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Label>, LabelServiceError> {
        Ok(self.repo.find_by_name(name.trim())?)
    }

    /// Labels whose name contains `query`, ignoring case.
    pub fn search_by_name(&self, query: &str) -> Result<Vec<Label>, LabelServiceError> {
        let needle = query.trim().to_lowercase();
        let labels = self.repo.list_labels()?;
        if needle.is_empty() {
            return Ok(labels);
        }
        Ok(labels
            .into_iter()
            .filter(|label| label.name.to_lowercase().contains(&needle))
            .collect())
    }

    pub fn roots(&self) -> Result<Vec<Label>, LabelServiceError> {
        Ok(self.repo.list_roots()?)
    }

    /// Direct children of an existing label, in sibling order.
    pub fn children(&self, id: LabelId) -> Result<Vec<Label>, LabelServiceError> {
        self.require(id)?;
        Ok(self.repo.list_children(id)?)
    }

    /// Moves a label under `new_parent`, or to root for `None`.
    pub fn set_parent(
        &self,
        id: LabelId,
        new_parent: Option<LabelId>,
    ) -> Result<(), LabelServiceError> {
        let result: Result<(), LabelServiceError> = self.repo.write_scope(|| {
            self.require(id)?;
            if let Some(parent_uuid) = new_parent {
                if parent_uuid == id {
                    return Err(LabelServiceError::SelfParent(id));
                }
                self.repo
                    .get_label(parent_uuid)?
                    .ok_or(LabelServiceError::LabelNotFound(parent_uuid))?;
                if self.is_ancestor(id, parent_uuid)? {
                    return Err(LabelServiceError::CycleDetected {
                        label_uuid: id,
                        parent_uuid,
                    });
                }
            }
            Ok(self.repo.set_parent(id, new_parent)?)
        });
        match &result {
            Ok(()) => info!(
                "event=label_set_parent module=label_service status=ok label_uuid={id} has_parent={}",
                new_parent.is_some()
            ),
            Err(err) => log_rejected("label_set_parent", err),
        }
        result
    }

    /// Renames a label. Renaming to its current name is a no-op write.
    pub fn rename(&self, id: LabelId, new_name: impl Into<String>) -> Result<(), LabelServiceError> {
        let new_name = new_name.into().trim().to_string();
        let result: Result<(), LabelServiceError> = self.repo.write_scope(|| {
            validate_name(&new_name)?;
            self.require(id)?;
            self.ensure_name_free(&new_name, Some(id))?;
            Ok(self.repo.rename_label(id, &new_name)?)
        });
        match &result {
            Ok(()) => info!("event=label_rename module=label_service status=ok label_uuid={id}"),
            Err(err) => log_rejected("label_rename", err),
        }
        result
    }

    /// Replaces color and description.
    pub fn update_appearance(
        &self,
        id: LabelId,
        color: impl Into<String>,
        description: Option<String>,
    ) -> Result<Label, LabelServiceError> {
        let color = color.into().trim().to_string();
        let description = normalize_description(description);
        let result: Result<Label, LabelServiceError> = self.repo.write_scope(|| {
            validate_color(&color)?;
            validate_description(description.as_deref())?;
            self.require(id)?;
            self.repo
                .update_appearance(id, &color, description.as_deref())?;
            self.require(id)
        });
        match &result {
            Ok(_) => info!(
                "event=label_update_appearance module=label_service status=ok label_uuid={id}"
            ),
            Err(err) => log_rejected("label_update_appearance", err),
        }
        result
    }

    /// Deletes a label with no children and no annotations. Its
    /// relationships go with it.
    pub fn delete(&self, id: LabelId) -> Result<(), LabelServiceError> {
        let result: Result<(), LabelServiceError> = self.repo.write_scope(|| {
            self.require(id)?;
            let child_count = self.repo.count_children(id)?;
            if child_count > 0 {
                return Err(LabelServiceError::HasChildren {
                    label_uuid: id,
                    child_count,
                });
            }
            let annotation_count = self.repo.annotation_count(id)?;
            if annotation_count > 0 {
                return Err(LabelServiceError::InUse {
                    label_uuid: id,
                    annotation_count,
                });
            }
            Ok(self.repo.delete_label(id)?)
        });
        match &result {
            Ok(()) => info!("event=label_delete module=label_service status=ok label_uuid={id}"),
            Err(err) => log_rejected("label_delete", err),
        }
        result
    }

    /// Height of the subtree under `id`: 1 for a leaf.
    pub fn depth(&self, id: LabelId) -> Result<usize, LabelServiceError> {
        self.tree()?
            .depth(id)
            .ok_or(LabelServiceError::LabelNotFound(id))
    }

    /// Snapshot of the whole hierarchy.
    pub fn tree(&self) -> Result<LabelTree, LabelServiceError> {
        Ok(LabelTree::from_edges(self.repo.hierarchy_edges()?))
    }

    /// Every label with its annotation count, zeros included.
    pub fn usage(&self) -> Result<Vec<LabelCount>, LabelServiceError> {
        Ok(self.repo.label_usage()?)
    }

    /// Labels no annotation uses.
    pub fn unused(&self) -> Result<Vec<Label>, LabelServiceError> {
        Ok(self.repo.unused_labels()?)
    }

    fn require(&self, id: LabelId) -> Result<Label, LabelServiceError> {
        self.repo
            .get_label(id)?
            .ok_or(LabelServiceError::LabelNotFound(id))
    }

    fn ensure_name_free(
        &self,
        name: &str,
        owner: Option<LabelId>,
    ) -> Result<(), LabelServiceError> {
        match self.repo.find_by_name(name)? {
            Some(existing) if Some(existing.uuid) != owner => {
                Err(LabelServiceError::DuplicateName(name.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Walks `candidate`'s parent chain looking for `label`. The walk stops
    /// at a root or after as many steps as there are labels.
    fn is_ancestor(&self, label: LabelId, candidate: LabelId) -> Result<bool, LabelServiceError> {
        let bound = self.repo.count_labels()?;
        let mut cursor = Some(candidate);
        let mut steps = 0_u64;
        while let Some(current) = cursor {
            if current == label {
                return Ok(true);
            }
            steps += 1;
            if steps > bound {
                // Stored chain is already cyclic; refuse to extend it.
                return Ok(true);
            }
            cursor = self
                .repo
                .get_label(current)?
                .ok_or(LabelServiceError::ParentNotFound(current))?
                .parent_uuid;
        }
        Ok(false)
    }
}

fn log_rejected(event: &str, err: &LabelServiceError) {
    match err {
        LabelServiceError::Repo(inner) => error!(
            "event={event} module=label_service status=error error_code={} error={inner}",
            err.code()
        ),
        _ => warn!(
            "event={event} module=label_service status=rejected error_code={}",
            err.code()
        ),
    }
}
