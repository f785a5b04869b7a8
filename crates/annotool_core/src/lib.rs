//! Annotation core: documents, hierarchical labels, directed label
//! relationships, span annotations and analytics over them.
//!
//! Every label, relationship and annotation invariant is enforced here.

pub mod config;
pub mod db;
pub mod extract;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod text;

pub use config::CoreSettings;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use extract::{ExtractError, PlainTextExtractor, TextExtractor};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::annotation::{Annotation, AnnotationId, AnnotationUpdate, DocumentScore};
pub use model::document::{Document, DocumentCount, DocumentId, FileType, FileTypeCount};
pub use model::label::{Label, LabelCount, LabelId, LabelValidationError};
pub use model::relationship::{EdgeDirection, LabelRelationship, RelationshipId};
pub use repo::annotation_repo::{AnnotationQuery, AnnotationRepository, SqliteAnnotationRepository};
pub use repo::document_repo::{DocumentRepository, SqliteDocumentRepository};
pub use repo::label_repo::{LabelRepository, SqliteLabelRepository};
pub use repo::relationship_repo::{RelationshipRepository, SqliteRelationshipRepository};
pub use repo::{EntityKind, RepoError, RepoResult, WriteScope};
pub use service::analytics_service::{
    AnalyticsError, AnalyticsService, ComprehensiveAnalytics, DashboardStats,
};
pub use service::annotation_service::{AnnotationService, AnnotationServiceError};
pub use service::document_service::{DocumentService, DocumentServiceError, Upload};
pub use service::label_service::{LabelService, LabelServiceError};
pub use service::relationship_service::{RelationshipService, RelationshipServiceError};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
