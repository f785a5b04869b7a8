//! Document domain model.
//!
//! Documents are produced by the import path: raw bytes go through a
//! [`crate::extract::TextExtractor`] and only the extracted text is kept for
//! annotation. The text is immutable once stored; span offsets of every
//! annotation are counted against it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable document identifier.
pub type DocumentId = Uuid;

/// Source format of an imported document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Txt,
    Docx,
    Pdf,
}

impl FileType {
    /// Stable storage/string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Docx => "docx",
            Self::Pdf => "pdf",
        }
    }

    /// Parses a file extension, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "txt" => Some(Self::Txt),
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Returns the extension after the last `.` of `filename`.
///
/// `None` when there is no dot or the dot is the last character.
pub fn file_extension(filename: &str) -> Option<&str> {
    let (_, extension) = filename.rsplit_once('.')?;
    if extension.is_empty() {
        None
    } else {
        Some(extension)
    }
}

/// Persisted document read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub uuid: DocumentId,
    /// User-facing name, renameable.
    pub name: String,
    pub original_filename: String,
    pub file_type: FileType,
    /// Extracted text. Never rewritten after import.
    pub content: String,
    /// Size of the uploaded bytes, not of `content`.
    pub file_size: i64,
    /// Epoch ms.
    pub uploaded_at: i64,
}

impl Document {
    /// Text length in the offset unit used by annotation spans.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Import input for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub uuid: DocumentId,
    pub name: String,
    pub original_filename: String,
    pub file_type: FileType,
    pub content: String,
    pub file_size: i64,
}

/// Document paired with its annotation count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentCount {
    pub document_uuid: DocumentId,
    pub document_name: String,
    pub count: u64,
}

/// Number of documents per file type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTypeCount {
    pub file_type: FileType,
    pub count: u64,
}
