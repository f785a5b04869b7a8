//! Text extraction seam for document import.
//!
//! The core only needs `bytes + file type -> text`. Binary formats need an
//! external implementation; the built-in [`PlainTextExtractor`] handles
//! `.txt` and reports everything else as unsupported.

use crate::model::document::FileType;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Extraction failure reported by a [`TextExtractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// Extractor cannot read this format.
    UnsupportedFormat(FileType),
    /// Input is malformed for its declared format.
    ExtractionFailed(String),
}

impl Display for ExtractError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedFormat(file_type) => {
                write!(f, "unsupported file type: {}", file_type.as_str())
            }
            Self::ExtractionFailed(message) => write!(f, "failed to extract text: {message}"),
        }
    }
}

impl Error for ExtractError {}

/// Turns uploaded bytes into the text annotations are anchored to.
pub trait TextExtractor {
    fn extract_text(&self, bytes: &[u8], file_type: FileType) -> Result<String, ExtractError>;
}

/// Strict UTF-8 reader for `.txt` uploads.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, bytes: &[u8], file_type: FileType) -> Result<String, ExtractError> {
        if file_type != FileType::Txt {
            return Err(ExtractError::UnsupportedFormat(file_type));
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|err| ExtractError::ExtractionFailed(err.to_string()))?;
        // A leading BOM would shift every offset by one char.
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
    }
}
