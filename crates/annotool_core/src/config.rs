//! Core tunables.
//!
//! # Responsibility
//! - Hold the knobs services read at runtime: context window, proximity
//!   threshold, analytics top-N sizes and the import size limit.
//! - Deserialize from partial serde input (JSON in the CLI), defaulting every
//!   field that is absent.
//!
//! # Invariants
//! - `normalized()` never returns a zero top-N size or a zero upload limit.

use crate::text::span::DEFAULT_CONTEXT_WINDOW;
use serde::{Deserialize, Serialize};

/// Default proximity threshold for concentration scoring, in chars.
pub const DEFAULT_PROXIMITY_THRESHOLD: usize = 100;
/// Default number of labels in the dashboard "most used" block.
pub const DEFAULT_DASHBOARD_TOP_LABELS: usize = 5;
/// Default number of labels in the dashboard distribution block.
pub const DEFAULT_DASHBOARD_DISTRIBUTION_SIZE: usize = 10;
/// Default number of labels per side in relationship statistics.
pub const DEFAULT_RELATIONSHIP_TOP_SIZE: usize = 5;
/// Default import size limit: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Runtime settings shared by core services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSettings {
    /// Chars kept before and after each annotation span.
    pub context_window: usize,
    /// Max `|a.start - b.end|` for two annotations to count as near.
    pub proximity_threshold: usize,
    pub dashboard_top_labels: usize,
    pub dashboard_distribution_size: usize,
    pub relationship_top_size: usize,
    pub max_upload_bytes: u64,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
            proximity_threshold: DEFAULT_PROXIMITY_THRESHOLD,
            dashboard_top_labels: DEFAULT_DASHBOARD_TOP_LABELS,
            dashboard_distribution_size: DEFAULT_DASHBOARD_DISTRIBUTION_SIZE,
            relationship_top_size: DEFAULT_RELATIONSHIP_TOP_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl CoreSettings {
    /// Replaces zero sizes and limits with their defaults.
    ///
    /// A zero context window or proximity is meaningful and kept as is.
    pub fn normalized(mut self) -> Self {
        if self.dashboard_top_labels == 0 {
            self.dashboard_top_labels = DEFAULT_DASHBOARD_TOP_LABELS;
        }
        if self.dashboard_distribution_size == 0 {
            self.dashboard_distribution_size = DEFAULT_DASHBOARD_DISTRIBUTION_SIZE;
        }
        if self.relationship_top_size == 0 {
            self.relationship_top_size = DEFAULT_RELATIONSHIP_TOP_SIZE;
        }
        if self.max_upload_bytes == 0 {
            self.max_upload_bytes = DEFAULT_MAX_UPLOAD_BYTES;
        }
        self
    }
}
