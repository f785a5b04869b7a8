//! Annotation domain model.
//!
//! # Invariants
//! - `0 <= start_position <= end_position <= char_len(document text)`.
//! - `selected_text`, `context_before` and `context_after` are always derived
//!   from the current positions; there is no API that sets them directly.

use crate::model::document::DocumentId;
use crate::model::label::LabelId;
use crate::text::span::SpanText;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable annotation identifier.
pub type AnnotationId = Uuid;

/// Persisted annotation read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub uuid: AnnotationId,
    pub document_uuid: DocumentId,
    pub label_uuid: LabelId,
    /// Inclusive char offset.
    pub start_position: usize,
    /// Exclusive char offset.
    pub end_position: usize,
    pub selected_text: String,
    pub context_before: String,
    pub context_after: String,
    /// Epoch ms.
    pub created_at: i64,
    /// Epoch ms.
    pub updated_at: i64,
}

impl Annotation {
    /// Span length in chars.
    pub fn len(&self) -> usize {
        self.end_position - self.start_position
    }

    pub fn is_empty(&self) -> bool {
        self.start_position == self.end_position
    }
}

/// Fully validated insert input. Built only by the annotation service after
/// span validation against the document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnnotation {
    pub uuid: AnnotationId,
    pub document_uuid: DocumentId,
    pub label_uuid: LabelId,
    pub start_position: usize,
    pub end_position: usize,
    pub span_text: SpanText,
}

/// Partial update request. `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationUpdate {
    pub label_uuid: Option<LabelId>,
    pub start_position: Option<usize>,
    pub end_position: Option<usize>,
}

/// Concentration score of one label inside one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentScore {
    pub document_uuid: DocumentId,
    pub document_name: String,
    pub score: u64,
}
