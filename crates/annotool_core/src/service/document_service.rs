//! Document import and lifecycle service.
//!
//! # Responsibility
//! - Validate uploads, extract their text and store the result.
//! - Remove documents together with their annotations.
//!
//! # Invariants
//! - Stored content never changes after import; only the name is editable.
//! - Deleting a document removes its annotations in the same write scope.

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::extract::{ExtractError, TextExtractor};
use crate::model::document::{file_extension, Document, DocumentId, FileType, NewDocument};
use crate::repo::annotation_repo::AnnotationRepository;
use crate::repo::document_repo::{DocumentRepository, DocumentSearchField};
use crate::repo::{EntityKind, RepoError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Errors from document operations.
#[derive(Debug)]
pub enum DocumentServiceError {
    /// Name is blank after trim.
    InvalidName,
    EmptyFile,
    FileTooLarge { size: u64, max_bytes: u64 },
    /// Extension missing or not one of txt/docx/pdf, or the extractor
    /// cannot read it.
    UnsupportedFormat(String),
    ExtractionFailed(String),
    DocumentNotFound(DocumentId),
    Repo(RepoError),
}

impl DocumentServiceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidName => "invalid_name",
            Self::EmptyFile => "empty_file",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::ExtractionFailed(_) => "extraction_failed",
            Self::DocumentNotFound(_) => "document_not_found",
            Self::Repo(_) => "repo_error",
        }
    }
}

impl Display for DocumentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "document name must not be blank"),
            Self::EmptyFile => write!(f, "uploaded file is empty"),
            Self::FileTooLarge { size, max_bytes } => {
                write!(f, "uploaded file has {size} bytes, limit is {max_bytes}")
            }
            Self::UnsupportedFormat(value) => write!(f, "unsupported file type: `{value}`"),
            Self::ExtractionFailed(message) => write!(f, "failed to extract text: {message}"),
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DocumentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for DocumentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: EntityKind::Document,
                id,
            } => Self::DocumentNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<ExtractError> for DocumentServiceError {
    fn from(value: ExtractError) -> Self {
        match value {
            ExtractError::UnsupportedFormat(file_type) => {
                Self::UnsupportedFormat(file_type.as_str().to_string())
            }
            ExtractError::ExtractionFailed(message) => Self::ExtractionFailed(message),
        }
    }
}

/// One upload handed to [`DocumentService::import`].
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    /// Display name; the original filename is used when absent or blank.
    pub name: Option<&'a str>,
    pub original_filename: &'a str,
    pub bytes: &'a [u8],
}

/// Document service facade.
pub struct DocumentService<D: DocumentRepository, A: AnnotationRepository> {
    documents: D,
    annotations: A,
    max_upload_bytes: u64,
}

impl<D: DocumentRepository, A: AnnotationRepository> DocumentService<D, A> {
    /// Creates service with the default upload limit. Both repositories must
    /// share one connection so deletes cascade atomically.
    pub fn new(documents: D, annotations: A) -> Self {
        Self::with_upload_limit(documents, annotations, DEFAULT_MAX_UPLOAD_BYTES)
    }

    pub fn with_upload_limit(documents: D, annotations: A, max_upload_bytes: u64) -> Self {
        Self {
            documents,
            annotations,
            max_upload_bytes,
        }
    }

    /// Validates, extracts and stores one upload.
    pub fn import(
        &self,
        upload: Upload<'_>,
        extractor: &dyn TextExtractor,
    ) -> Result<Document, DocumentServiceError> {
        let result = self.prepare(upload, extractor).and_then(|draft| {
            self.documents
                .write_scope(|| self.documents.insert_document(&draft))
                .map_err(DocumentServiceError::from)
        });
        match &result {
            Ok(document) => info!(
                "event=document_import module=document_service status=ok document_uuid={} file_type={} file_size={} text_chars={}",
                document.uuid,
                document.file_type.as_str(),
                document.file_size,
                document.char_len()
            ),
            Err(err) => log_rejected("document_import", err),
        }
        result
    }

    pub fn rename(
        &self,
        id: DocumentId,
        name: &str,
    ) -> Result<Document, DocumentServiceError> {
        let name = name.trim();
        let result: Result<Document, DocumentServiceError> = self.documents.write_scope(|| {
            if name.is_empty() {
                return Err(DocumentServiceError::InvalidName);
            }
            self.documents.rename_document(id, name)?;
            self.documents
                .get_document(id)?
                .ok_or(DocumentServiceError::DocumentNotFound(id))
        });
        match &result {
            Ok(_) => info!(
                "event=document_rename module=document_service status=ok document_uuid={id}"
            ),
            Err(err) => log_rejected("document_rename", err),
        }
        result
    }

    /// Deletes a document and its annotations.
    pub fn delete(&self, id: DocumentId) -> Result<(), DocumentServiceError> {
        let result: Result<u64, DocumentServiceError> = self.documents.write_scope(|| {
            if self.documents.get_document(id)?.is_none() {
                return Err(DocumentServiceError::DocumentNotFound(id));
            }
            let removed = self.annotations.delete_by_document(id)?;
            self.documents.delete_document(id)?;
            Ok(removed)
        });
        match &result {
            Ok(removed) => info!(
                "event=document_delete module=document_service status=ok document_uuid={id} annotations_removed={removed}"
            ),
            Err(err) => log_rejected("document_delete", err),
        }
        result.map(|_| ())
    }

    pub fn get(&self, id: DocumentId) -> Result<Option<Document>, DocumentServiceError> {
        Ok(self.documents.get_document(id)?)
    }

    /// All documents, newest first.
    pub fn list(&self) -> Result<Vec<Document>, DocumentServiceError> {
        Ok(self.documents.list_documents()?)
    }

    pub fn by_file_type(&self, file_type: FileType) -> Result<Vec<Document>, DocumentServiceError> {
        Ok(self.documents.list_by_file_type(file_type)?)
    }

    pub fn search_by_name(&self, query: &str) -> Result<Vec<Document>, DocumentServiceError> {
        Ok(self
            .documents
            .search_documents(DocumentSearchField::Name, query)?)
    }

    pub fn search_by_content(&self, query: &str) -> Result<Vec<Document>, DocumentServiceError> {
        Ok(self
            .documents
            .search_documents(DocumentSearchField::Content, query)?)
    }

    pub fn count(&self) -> Result<u64, DocumentServiceError> {
        Ok(self.documents.count_documents()?)
    }

    fn prepare(
        &self,
        upload: Upload<'_>,
        extractor: &dyn TextExtractor,
    ) -> Result<NewDocument, DocumentServiceError> {
        if upload.bytes.is_empty() {
            return Err(DocumentServiceError::EmptyFile);
        }
        let size = upload.bytes.len() as u64;
        if size > self.max_upload_bytes {
            return Err(DocumentServiceError::FileTooLarge {
                size,
                max_bytes: self.max_upload_bytes,
            });
        }
        let original_filename = upload.original_filename.trim();
        let extension = file_extension(original_filename)
            .ok_or_else(|| DocumentServiceError::UnsupportedFormat(original_filename.to_string()))?;
        let file_type = FileType::parse(extension)
            .ok_or_else(|| DocumentServiceError::UnsupportedFormat(extension.to_string()))?;
        let name = upload
            .name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(original_filename);
        if name.is_empty() {
            return Err(DocumentServiceError::InvalidName);
        }

        let content = extractor.extract_text(upload.bytes, file_type)?;
        Ok(NewDocument {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            original_filename: original_filename.to_string(),
            file_type,
            content,
            file_size: i64::try_from(size).map_err(|_| DocumentServiceError::FileTooLarge {
                size,
                max_bytes: self.max_upload_bytes,
            })?,
        })
    }
}

fn log_rejected(event: &str, err: &DocumentServiceError) {
    match err {
        DocumentServiceError::Repo(inner) => error!(
            "event={event} module=document_service status=error error_code={} error={inner}",
            err.code()
        ),
        _ => warn!(
            "event={event} module=document_service status=rejected error_code={}",
            err.code()
        ),
    }
}
