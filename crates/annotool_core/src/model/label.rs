//! Label domain model.
//!
//! # Responsibility
//! - Define the label record and its creation draft.
//! - Validate name, color and description formats.
//!
//! # Invariants
//! - `name` is trimmed, non-empty and at most 255 chars.
//! - `color` matches `#RRGGBB` (hex digits, either case).
//! - `description`, when set, is at most 1000 chars.
//! - `parent_uuid` is a back reference only; child ordering is owned by the
//!   hierarchy index in storage.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable label identifier.
pub type LabelId = Uuid;

/// Maximum label name length in chars.
pub const LABEL_NAME_MAX_CHARS: usize = 255;
/// Maximum description length in chars, shared by labels and relationships.
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid color regex"));

/// Label validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelValidationError {
    /// Name is blank after trim.
    BlankName,
    /// Name exceeds [`LABEL_NAME_MAX_CHARS`].
    NameTooLong { max_chars: usize },
    /// Color is not a `#RRGGBB` hex string.
    InvalidColor(String),
    /// Description exceeds [`DESCRIPTION_MAX_CHARS`].
    DescriptionTooLong { max_chars: usize },
}

impl LabelValidationError {
    /// Offending field name.
    pub fn field(&self) -> &'static str {
        match self {
            Self::BlankName | Self::NameTooLong { .. } => "name",
            Self::InvalidColor(_) => "color",
            Self::DescriptionTooLong { .. } => "description",
        }
    }
}

impl Display for LabelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "label name must not be blank"),
            Self::NameTooLong { max_chars } => {
                write!(f, "label name must not exceed {max_chars} characters")
            }
            Self::InvalidColor(value) => {
                write!(f, "color `{value}` must be a hex code like #FF0000")
            }
            Self::DescriptionTooLong { max_chars } => {
                write!(f, "description must not exceed {max_chars} characters")
            }
        }
    }
}

impl Error for LabelValidationError {}

/// Persisted label read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub uuid: LabelId,
    /// Globally unique, case-sensitive.
    pub name: String,
    /// `#RRGGBB`.
    pub color: String,
    pub description: Option<String>,
    /// `None` means root label.
    pub parent_uuid: Option<LabelId>,
    /// Epoch ms.
    pub created_at: i64,
    /// Epoch ms.
    pub updated_at: i64,
}

impl Label {
    /// Returns whether this label has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_uuid.is_none()
    }
}

/// Creation input for one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLabel {
    pub uuid: LabelId,
    pub name: String,
    pub color: String,
    pub description: Option<String>,
    pub parent_uuid: Option<LabelId>,
}

impl NewLabel {
    /// Builds a draft with a generated id and normalized text fields.
    pub fn new(
        name: impl Into<String>,
        color: impl Into<String>,
        description: Option<String>,
        parent_uuid: Option<LabelId>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            color: color.into().trim().to_string(),
            description: normalize_description(description),
            parent_uuid,
        }
    }

    /// Validates format-level invariants. Uniqueness and parent existence are
    /// storage concerns checked by the hierarchy service.
    pub fn validate(&self) -> Result<(), LabelValidationError> {
        validate_name(&self.name)?;
        validate_color(&self.color)?;
        validate_description(self.description.as_deref())
    }
}

/// Returns whether `value` is a `#RRGGBB` color.
pub fn is_valid_color(value: &str) -> bool {
    COLOR_RE.is_match(value)
}

pub fn validate_name(name: &str) -> Result<(), LabelValidationError> {
    if name.trim().is_empty() {
        return Err(LabelValidationError::BlankName);
    }
    if name.chars().count() > LABEL_NAME_MAX_CHARS {
        return Err(LabelValidationError::NameTooLong {
            max_chars: LABEL_NAME_MAX_CHARS,
        });
    }
    Ok(())
}

pub fn validate_color(color: &str) -> Result<(), LabelValidationError> {
    if is_valid_color(color) {
        Ok(())
    } else {
        Err(LabelValidationError::InvalidColor(color.to_string()))
    }
}

pub fn validate_description(description: Option<&str>) -> Result<(), LabelValidationError> {
    match description {
        Some(value) if value.chars().count() > DESCRIPTION_MAX_CHARS => {
            Err(LabelValidationError::DescriptionTooLong {
                max_chars: DESCRIPTION_MAX_CHARS,
            })
        }
        _ => Ok(()),
    }
}

/// Trims a description and collapses blank input to `None`.
pub fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Label paired with an aggregate count (usage, degree, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: Label,
    pub count: u64,
}
