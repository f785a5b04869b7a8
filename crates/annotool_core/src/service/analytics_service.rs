//! Read-only analytics over labels, relationships, annotations and
//! documents.
//!
//! No state of its own: every call reads the stores fresh. Result records
//! serialize with serde so a boundary layer can return them as JSON.

use crate::config::CoreSettings;
use crate::model::annotation::DocumentScore;
use crate::model::document::{DocumentCount, DocumentId, FileType, FileTypeCount};
use crate::model::label::{Label, LabelCount, LabelId};
use crate::model::relationship::EdgeDirection;
use crate::repo::annotation_repo::AnnotationRepository;
use crate::repo::document_repo::DocumentRepository;
use crate::repo::label_repo::LabelRepository;
use crate::repo::relationship_repo::RelationshipRepository;
use crate::repo::RepoError;
use crate::service::label_tree::LabelTree;
use log::debug;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from analytics queries.
#[derive(Debug)]
pub enum AnalyticsError {
    LabelNotFound(LabelId),
    Repo(RepoError),
}

impl AnalyticsError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LabelNotFound(_) => "label_not_found",
            Self::Repo(_) => "repo_error",
        }
    }
}

impl Display for AnalyticsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LabelNotFound(id) => write!(f, "label not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AnalyticsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::LabelNotFound(_) => None,
        }
    }
}

impl From<RepoError> for AnalyticsError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Overview counts for a dashboard view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_labels: u64,
    pub total_documents: u64,
    pub total_annotations: u64,
    pub total_relationships: u64,
    /// Most used labels, zero-usage labels included when there are few.
    pub most_used_labels: Vec<LabelCount>,
    pub documents_by_file_type: Vec<FileTypeCount>,
    /// Annotation count per label, only labels in use.
    pub annotation_distribution: Vec<LabelCount>,
}

/// Label usage with its share of all annotations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelFrequency {
    pub label: Label,
    pub usage_count: u64,
    /// `usage_count / total * 100`, or 0 when there are no annotations.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipStatistics {
    pub total_relationships: u64,
    /// Ranked by out-degree.
    pub top_sources: Vec<LabelCount>,
    /// Ranked by in-degree.
    pub top_targets: Vec<LabelCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyStatistics {
    pub total_labels: u64,
    pub root_labels: u64,
    pub child_labels: u64,
    /// Mean root depth; 0 without labels.
    pub average_depth: f64,
    pub max_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationTrends {
    pub total_annotations: u64,
    pub total_documents: u64,
    /// 0 without documents.
    pub average_annotations_per_document: f64,
}

/// Totals plus the ranked label shares in one read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComprehensiveAnalytics {
    pub total_documents: u64,
    pub total_annotations: u64,
    pub total_labels: u64,
    pub total_relationships: u64,
    /// Sized by `dashboard_distribution_size`.
    pub most_used_labels: Vec<LabelFrequency>,
}

/// Document that no annotation points into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnannotatedDocument {
    pub document_uuid: DocumentId,
    pub name: String,
    pub file_type: FileType,
    pub file_size: i64,
    /// Epoch ms.
    pub uploaded_at: i64,
}

/// Analytics service facade.
///
/// All four repositories must read the same database.
pub struct AnalyticsService<L, R, A, D>
where
    L: LabelRepository,
    R: RelationshipRepository,
    A: AnnotationRepository,
    D: DocumentRepository,
{
    labels: L,
    relationships: R,
    annotations: A,
    documents: D,
    settings: CoreSettings,
}

impl<L, R, A, D> AnalyticsService<L, R, A, D>
where
    L: LabelRepository,
    R: RelationshipRepository,
    A: AnnotationRepository,
    D: DocumentRepository,
{
    /// Creates service from repositories and normalized settings.
    pub fn new(labels: L, relationships: R, annotations: A, documents: D, settings: CoreSettings) -> Self {
        Self {
            labels,
            relationships,
            annotations,
            documents,
            settings: settings.normalized(),
        }
    }

    pub fn dashboard(&self) -> Result<DashboardStats, AnalyticsError> {
        let started_at = Instant::now();
        let mut most_used_labels = self.labels.label_usage()?;
        most_used_labels.truncate(self.settings.dashboard_top_labels);
        let mut annotation_distribution = self.annotations.count_by_label()?;
        annotation_distribution.truncate(self.settings.dashboard_distribution_size);

        let stats = DashboardStats {
            total_labels: self.labels.count_labels()?,
            total_documents: self.documents.count_documents()?,
            total_annotations: self.annotations.count_annotations()?,
            total_relationships: self.relationships.count_relationships()?,
            most_used_labels,
            documents_by_file_type: self.documents.count_by_file_type()?,
            annotation_distribution,
        };
        debug!(
            "event=analytics_dashboard module=analytics_service status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(stats)
    }

    pub fn comprehensive(&self) -> Result<ComprehensiveAnalytics, AnalyticsError> {
        Ok(ComprehensiveAnalytics {
            total_documents: self.documents.count_documents()?,
            total_annotations: self.annotations.count_annotations()?,
            total_labels: self.labels.count_labels()?,
            total_relationships: self.relationships.count_relationships()?,
            most_used_labels: self.most_frequent_labels(self.settings.dashboard_distribution_size)?,
        })
    }

    /// Top `limit` labels by usage with their percentage of all annotations.
    pub fn most_frequent_labels(&self, limit: usize) -> Result<Vec<LabelFrequency>, AnalyticsError> {
        let total = self.annotations.count_annotations()?;
        Ok(self
            .labels
            .label_usage()?
            .into_iter()
            .take(limit)
            .map(|item| LabelFrequency {
                percentage: percentage(item.count, total),
                usage_count: item.count,
                label: item.label,
            })
            .collect())
    }

    /// Documents where one label's annotations cluster, scored with the
    /// configured proximity threshold.
    pub fn concentration_segments(
        &self,
        label: LabelId,
        limit: usize,
    ) -> Result<Vec<DocumentScore>, AnalyticsError> {
        if self.labels.get_label(label)?.is_none() {
            return Err(AnalyticsError::LabelNotFound(label));
        }
        Ok(self
            .annotations
            .concentration(label, self.settings.proximity_threshold, Some(limit))?)
    }

    pub fn relationship_statistics(&self) -> Result<RelationshipStatistics, AnalyticsError> {
        let top = self.settings.relationship_top_size;
        Ok(RelationshipStatistics {
            total_relationships: self.relationships.count_relationships()?,
            top_sources: self.relationships.most_connected(EdgeDirection::Outgoing, top)?,
            top_targets: self.relationships.most_connected(EdgeDirection::Incoming, top)?,
        })
    }

    pub fn unused_labels(&self) -> Result<Vec<Label>, AnalyticsError> {
        Ok(self.labels.unused_labels()?)
    }

    pub fn documents_without_annotations(&self) -> Result<Vec<UnannotatedDocument>, AnalyticsError> {
        Ok(self
            .documents
            .without_annotations()?
            .into_iter()
            .map(|document| UnannotatedDocument {
                document_uuid: document.uuid,
                name: document.name,
                file_type: document.file_type,
                file_size: document.file_size,
                uploaded_at: document.uploaded_at,
            })
            .collect())
    }

    /// Every document with its annotation count, zeros included.
    pub fn document_annotation_statistics(
        &self,
        limit: usize,
    ) -> Result<Vec<DocumentCount>, AnalyticsError> {
        Ok(self.documents.annotation_counts(Some(limit))?)
    }

    pub fn hierarchy_statistics(&self) -> Result<HierarchyStatistics, AnalyticsError> {
        let tree = LabelTree::from_edges(self.labels.hierarchy_edges()?);
        let depths = tree.root_depths();
        let total_labels = tree.len() as u64;
        let root_labels = tree.roots().len() as u64;
        let average_depth = if depths.is_empty() {
            0.0
        } else {
            depths.iter().sum::<usize>() as f64 / depths.len() as f64
        };
        Ok(HierarchyStatistics {
            total_labels,
            root_labels,
            child_labels: total_labels - root_labels,
            average_depth,
            max_depth: depths.into_iter().max().unwrap_or(0),
        })
    }

    pub fn annotation_trends(&self) -> Result<AnnotationTrends, AnalyticsError> {
        let total_annotations = self.annotations.count_annotations()?;
        let total_documents = self.documents.count_documents()?;
        let average_annotations_per_document = if total_documents == 0 {
            0.0
        } else {
            total_annotations as f64 / total_documents as f64
        };
        Ok(AnnotationTrends {
            total_annotations,
            total_documents,
            average_annotations_per_document,
        })
    }
}

fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}
