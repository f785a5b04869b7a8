//! Annotation store service.
//!
//! # Responsibility
//! - Anchor annotations to document text and keep derived span text in
//!   sync with positions.
//! - Expose the annotation query surface and grouped counts.
//!
//! # Invariants
//! - Every stored span satisfies `start <= end <= char_len(text)` for the
//!   document text at write time.
//! - `selected_text` and both context windows are only ever produced by
//!   [`span::derive`] from the stored positions.

use crate::config::CoreSettings;
use crate::model::annotation::{
    Annotation, AnnotationId, AnnotationUpdate, DocumentScore, NewAnnotation,
};
use crate::model::document::{DocumentCount, DocumentId};
use crate::model::label::{LabelCount, LabelId};
use crate::repo::annotation_repo::{AnnotationQuery, AnnotationRepository};
use crate::repo::{EntityKind, RepoError};
use crate::text::span::{self, InvalidRange, DEFAULT_CONTEXT_WINDOW};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Errors from annotation operations.
#[derive(Debug)]
pub enum AnnotationServiceError {
    DocumentNotFound(DocumentId),
    LabelNotFound(LabelId),
    AnnotationNotFound(AnnotationId),
    /// Span does not fit the current document text.
    InvalidRange {
        start: usize,
        end: usize,
        text_len: usize,
    },
    Repo(RepoError),
}

impl AnnotationServiceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DocumentNotFound(_) => "document_not_found",
            Self::LabelNotFound(_) => "label_not_found",
            Self::AnnotationNotFound(_) => "annotation_not_found",
            Self::InvalidRange { .. } => "invalid_range",
            Self::Repo(_) => "repo_error",
        }
    }
}

impl Display for AnnotationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::LabelNotFound(id) => write!(f, "label not found: {id}"),
            Self::AnnotationNotFound(id) => write!(f, "annotation not found: {id}"),
            Self::InvalidRange {
                start,
                end,
                text_len,
            } => write!(
                f,
                "invalid span [{start}, {end}) for document text of length {text_len}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AnnotationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AnnotationServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: EntityKind::Annotation,
                id,
            } => Self::AnnotationNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<InvalidRange> for AnnotationServiceError {
    fn from(value: InvalidRange) -> Self {
        Self::InvalidRange {
            start: value.start,
            end: value.end,
            text_len: value.text_len,
        }
    }
}

/// Annotation store service facade.
pub struct AnnotationService<R: AnnotationRepository> {
    repo: R,
    context_window: usize,
}

impl<R: AnnotationRepository> AnnotationService<R> {
    /// Creates service with the default context window.
    pub fn new(repo: R) -> Self {
        Self::with_context_window(repo, DEFAULT_CONTEXT_WINDOW)
    }

    /// Creates service using `settings.context_window`.
    pub fn with_settings(repo: R, settings: &CoreSettings) -> Self {
        Self::with_context_window(repo, settings.context_window)
    }

    /// Creates service keeping `context_window` chars around each span.
    pub fn with_context_window(repo: R, context_window: usize) -> Self {
        Self {
            repo,
            context_window,
        }
    }

    /// Anchors a new annotation to the document's current text.
    pub fn create(
        &self,
        document_uuid: DocumentId,
        label_uuid: LabelId,
        start: usize,
        end: usize,
    ) -> Result<Annotation, AnnotationServiceError> {
        let result: Result<Annotation, AnnotationServiceError> = self.repo.write_scope(|| {
            let text = self.document_text(document_uuid)?;
            self.ensure_label(label_uuid)?;
            let span_text = span::derive(&text, start, end, self.context_window)?;
            let draft = NewAnnotation {
                uuid: Uuid::new_v4(),
                document_uuid,
                label_uuid,
                start_position: start,
                end_position: end,
                span_text,
            };
            Ok(self.repo.insert_annotation(&draft)?)
        });
        match &result {
            Ok(annotation) => info!(
                "event=annotation_create module=annotation_service status=ok annotation_uuid={} document_uuid={document_uuid} label_uuid={label_uuid} span_len={}",
                annotation.uuid,
                annotation.len()
            ),
            Err(err) => log_rejected("annotation_create", err),
        }
        result
    }

    /// Applies a partial update. Changed positions are validated as a whole
    /// range and re-derive all span text; `updated_at` is always refreshed.
    pub fn update(
        &self,
        id: AnnotationId,
        update: AnnotationUpdate,
    ) -> Result<Annotation, AnnotationServiceError> {
        let result: Result<Annotation, AnnotationServiceError> = self.repo.write_scope(|| {
            let current = self.require(id)?;
            let label_uuid = update.label_uuid.unwrap_or(current.label_uuid);
            if label_uuid != current.label_uuid {
                self.ensure_label(label_uuid)?;
            }
            let start = update.start_position.unwrap_or(current.start_position);
            let end = update.end_position.unwrap_or(current.end_position);
            let span_text = if start != current.start_position || end != current.end_position {
                let text = self.document_text(current.document_uuid)?;
                span::derive(&text, start, end, self.context_window)?
            } else {
                span::SpanText {
                    selected_text: current.selected_text,
                    context_before: current.context_before,
                    context_after: current.context_after,
                }
            };
            let record = NewAnnotation {
                uuid: id,
                document_uuid: current.document_uuid,
                label_uuid,
                start_position: start,
                end_position: end,
                span_text,
            };
            Ok(self.repo.update_annotation(&record)?)
        });
        match &result {
            Ok(_) => info!(
                "event=annotation_update module=annotation_service status=ok annotation_uuid={id}"
            ),
            Err(err) => log_rejected("annotation_update", err),
        }
        result
    }

    pub fn delete(&self, id: AnnotationId) -> Result<(), AnnotationServiceError> {
        let result: Result<(), AnnotationServiceError> =
            self.repo.write_scope(|| Ok(self.repo.delete_annotation(id)?));
        match &result {
            Ok(()) => info!(
                "event=annotation_delete module=annotation_service status=ok annotation_uuid={id}"
            ),
            Err(err) => log_rejected("annotation_delete", err),
        }
        result
    }

    /// Removes every annotation of a document. Zero matches is not an error.
    pub fn delete_by_document(&self, document_uuid: DocumentId) -> Result<u64, AnnotationServiceError> {
        let removed: u64 = self
            .repo
            .write_scope(|| self.repo.delete_by_document(document_uuid))?;
        info!(
            "event=annotation_delete_by_document module=annotation_service status=ok document_uuid={document_uuid} removed={removed}"
        );
        Ok(removed)
    }

    /// Removes every annotation of a label. Zero matches is not an error.
    pub fn delete_by_label(&self, label_uuid: LabelId) -> Result<u64, AnnotationServiceError> {
        let removed: u64 = self
            .repo
            .write_scope(|| self.repo.delete_by_label(label_uuid))?;
        info!(
            "event=annotation_delete_by_label module=annotation_service status=ok label_uuid={label_uuid} removed={removed}"
        );
        Ok(removed)
    }

    pub fn get(&self, id: AnnotationId) -> Result<Option<Annotation>, AnnotationServiceError> {
        Ok(self.repo.get_annotation(id)?)
    }

    pub fn list_all(&self) -> Result<Vec<Annotation>, AnnotationServiceError> {
        self.list(&AnnotationQuery::default())
    }

    pub fn list(&self, query: &AnnotationQuery) -> Result<Vec<Annotation>, AnnotationServiceError> {
        Ok(self.repo.list_annotations(query)?)
    }

    /// Annotations of one document ordered by start position.
    pub fn by_document(
        &self,
        document_uuid: DocumentId,
    ) -> Result<Vec<Annotation>, AnnotationServiceError> {
        self.list(&AnnotationQuery::for_document(document_uuid))
    }

    pub fn by_label(&self, label_uuid: LabelId) -> Result<Vec<Annotation>, AnnotationServiceError> {
        self.list(&AnnotationQuery::for_label(label_uuid))
    }

    pub fn by_document_and_label(
        &self,
        document_uuid: DocumentId,
        label_uuid: LabelId,
    ) -> Result<Vec<Annotation>, AnnotationServiceError> {
        self.list(&AnnotationQuery {
            label_uuid: Some(label_uuid),
            ..AnnotationQuery::for_document(document_uuid)
        })
    }

    /// Annotations of one document fully inside `[start, end]`.
    pub fn in_range(
        &self,
        document_uuid: DocumentId,
        start: usize,
        end: usize,
    ) -> Result<Vec<Annotation>, AnnotationServiceError> {
        self.list(&AnnotationQuery {
            within: Some((start, end)),
            ..AnnotationQuery::for_document(document_uuid)
        })
    }

    /// Case-insensitive substring search over selected text.
    pub fn search_text(&self, query: &str) -> Result<Vec<Annotation>, AnnotationServiceError> {
        self.list(&AnnotationQuery {
            text_contains: Some(query.to_string()),
            ..AnnotationQuery::default()
        })
    }

    pub fn count(&self) -> Result<u64, AnnotationServiceError> {
        Ok(self.repo.count_annotations()?)
    }

    pub fn count_by_label(&self) -> Result<Vec<LabelCount>, AnnotationServiceError> {
        Ok(self.repo.count_by_label()?)
    }

    pub fn count_by_document(&self) -> Result<Vec<DocumentCount>, AnnotationServiceError> {
        Ok(self.repo.count_by_document()?)
    }

    /// Per-document pair-proximity score for one label.
    ///
    /// Counts ordered pairs `(a1, a2)` with `|a1.start - a2.end| <= proximity`,
    /// self-pairs and both orientations included. The double count inflates
    /// scores and may be unintended; it is kept for score compatibility.
    pub fn concentration(
        &self,
        label_uuid: LabelId,
        proximity: usize,
        limit: Option<usize>,
    ) -> Result<Vec<DocumentScore>, AnnotationServiceError> {
        self.ensure_label(label_uuid)?;
        Ok(self.repo.concentration(label_uuid, proximity, limit)?)
    }

    fn require(&self, id: AnnotationId) -> Result<Annotation, AnnotationServiceError> {
        self.repo
            .get_annotation(id)?
            .ok_or(AnnotationServiceError::AnnotationNotFound(id))
    }

    fn document_text(&self, id: DocumentId) -> Result<String, AnnotationServiceError> {
        self.repo
            .document_text(id)?
            .ok_or(AnnotationServiceError::DocumentNotFound(id))
    }

    fn ensure_label(&self, id: LabelId) -> Result<(), AnnotationServiceError> {
        if self.repo.label_exists(id)? {
            Ok(())
        } else {
            Err(AnnotationServiceError::LabelNotFound(id))
        }
    }
}

fn log_rejected(event: &str, err: &AnnotationServiceError) {
    match err {
        AnnotationServiceError::Repo(inner) => error!(
            "event={event} module=annotation_service status=error error_code={} error={inner}",
            err.code()
        ),
        _ => warn!(
            "event={event} module=annotation_service status=rejected error_code={}",
            err.code()
        ),
    }
}
