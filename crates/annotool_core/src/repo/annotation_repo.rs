//! Annotation repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist annotations with their derived span text.
//! - Serve the filtered listings and grouped counts analytics relies on.
//!
//! # Invariants
//! - The repository stores what it is given; range validation against
//!   document text happens in the annotation service before any write.
//! - Listings filtered by document are ordered by `start_position`, then
//!   insertion order. Unfiltered listings use insertion order.

use crate::model::annotation::{Annotation, AnnotationId, DocumentScore, NewAnnotation};
use crate::model::document::{DocumentCount, DocumentId};
use crate::model::label::{LabelCount, LabelId};
use crate::repo::error::{EntityKind, RepoError, RepoResult};
use crate::repo::label_repo::{self, parse_label_count_row, LABEL_COLUMNS_SQL};
use crate::repo::support::{
    contains_ignore_case, ensure_connection_ready, immediate_scope, parse_uuid, to_i64,
    to_u64, to_usize, NOW_MS_SQL,
};
use crate::repo::WriteScope;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const ANNOTATION_SELECT_SQL: &str = "SELECT
    uuid,
    document_uuid,
    label_uuid,
    start_position,
    end_position,
    selected_text,
    context_before,
    context_after,
    created_at,
    updated_at
FROM annotations";

/// Filter options for listing annotations. Empty query lists everything.
#[derive(Debug, Clone, Default)]
pub struct AnnotationQuery {
    pub document_uuid: Option<DocumentId>,
    pub label_uuid: Option<LabelId>,
    /// Keeps spans fully contained in `[start, end]`.
    pub within: Option<(usize, usize)>,
    /// Case-insensitive substring over `selected_text`.
    pub text_contains: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl AnnotationQuery {
    pub fn for_document(document_uuid: DocumentId) -> Self {
        Self {
            document_uuid: Some(document_uuid),
            ..Self::default()
        }
    }

    pub fn for_label(label_uuid: LabelId) -> Self {
        Self {
            label_uuid: Some(label_uuid),
            ..Self::default()
        }
    }
}

/// Repository interface for annotations.
pub trait AnnotationRepository: WriteScope {
    fn insert_annotation(&self, draft: &NewAnnotation) -> RepoResult<Annotation>;
    fn get_annotation(&self, id: AnnotationId) -> RepoResult<Option<Annotation>>;
    /// Rewrites label, positions and span text of `record.uuid`.
    /// The owning document never changes.
    fn update_annotation(&self, record: &NewAnnotation) -> RepoResult<Annotation>;
    fn delete_annotation(&self, id: AnnotationId) -> RepoResult<()>;
    /// Removes every annotation of one document, returning the count.
    fn delete_by_document(&self, document: DocumentId) -> RepoResult<u64>;
    /// Removes every annotation of one label, returning the count.
    fn delete_by_label(&self, label: LabelId) -> RepoResult<u64>;
    fn list_annotations(&self, query: &AnnotationQuery) -> RepoResult<Vec<Annotation>>;
    fn count_annotations(&self) -> RepoResult<u64>;
    /// Labels that have annotations, with counts, descending.
    fn count_by_label(&self) -> RepoResult<Vec<LabelCount>>;
    /// Documents that have annotations, with counts, descending.
    fn count_by_document(&self) -> RepoResult<Vec<DocumentCount>>;
    /// Pair-proximity score per document for one label, descending.
    fn concentration(
        &self,
        label: LabelId,
        proximity: usize,
        limit: Option<usize>,
    ) -> RepoResult<Vec<DocumentScore>>;
    /// Current text of one document, if it exists.
    fn document_text(&self, document: DocumentId) -> RepoResult<Option<String>>;
    fn label_exists(&self, id: LabelId) -> RepoResult<bool>;
}

/// SQLite-backed annotation repository.
pub struct SqliteAnnotationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAnnotationRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["documents", "labels", "annotations"])?;
        Ok(Self { conn })
    }
}

impl WriteScope for SqliteAnnotationRepository<'_> {
    fn write_scope<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        immediate_scope(self.conn, op)
    }
}

impl AnnotationRepository for SqliteAnnotationRepository<'_> {
    fn insert_annotation(&self, draft: &NewAnnotation) -> RepoResult<Annotation> {
        self.conn.execute(
            "INSERT INTO annotations (
                uuid,
                document_uuid,
                label_uuid,
                start_position,
                end_position,
                selected_text,
                context_before,
                context_after
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                draft.uuid.to_string(),
                draft.document_uuid.to_string(),
                draft.label_uuid.to_string(),
                to_i64(draft.start_position, "start_position")?,
                to_i64(draft.end_position, "end_position")?,
                draft.span_text.selected_text.as_str(),
                draft.span_text.context_before.as_str(),
                draft.span_text.context_after.as_str(),
            ],
        )?;
        self.get_annotation(draft.uuid)?.ok_or(RepoError::NotFound {
            entity: EntityKind::Annotation,
            id: draft.uuid,
        })
    }

    fn get_annotation(&self, id: AnnotationId) -> RepoResult<Option<Annotation>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ANNOTATION_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_annotation_row(row)?));
        }
        Ok(None)
    }

    fn update_annotation(&self, record: &NewAnnotation) -> RepoResult<Annotation> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE annotations
                 SET
                    label_uuid = ?2,
                    start_position = ?3,
                    end_position = ?4,
                    selected_text = ?5,
                    context_before = ?6,
                    context_after = ?7,
                    updated_at = {NOW_MS_SQL}
                 WHERE uuid = ?1;"
            ),
            params![
                record.uuid.to_string(),
                record.label_uuid.to_string(),
                to_i64(record.start_position, "start_position")?,
                to_i64(record.end_position, "end_position")?,
                record.span_text.selected_text.as_str(),
                record.span_text.context_before.as_str(),
                record.span_text.context_after.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(not_found(record.uuid));
        }
        self.get_annotation(record.uuid)?
            .ok_or_else(|| not_found(record.uuid))
    }

    fn delete_annotation(&self, id: AnnotationId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM annotations WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    fn delete_by_document(&self, document: DocumentId) -> RepoResult<u64> {
        let removed = self.conn.execute(
            "DELETE FROM annotations WHERE document_uuid = ?1;",
            [document.to_string()],
        )?;
        Ok(removed as u64)
    }

    fn delete_by_label(&self, label: LabelId) -> RepoResult<u64> {
        let removed = self.conn.execute(
            "DELETE FROM annotations WHERE label_uuid = ?1;",
            [label.to_string()],
        )?;
        Ok(removed as u64)
    }

    fn list_annotations(&self, query: &AnnotationQuery) -> RepoResult<Vec<Annotation>> {
        let mut sql = format!("{ANNOTATION_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(document) = query.document_uuid {
            sql.push_str(" AND document_uuid = ?");
            bind_values.push(Value::Text(document.to_string()));
        }
        if let Some(label) = query.label_uuid {
            sql.push_str(" AND label_uuid = ?");
            bind_values.push(Value::Text(label.to_string()));
        }
        if let Some((start, end)) = query.within {
            sql.push_str(" AND start_position >= ? AND end_position <= ?");
            bind_values.push(Value::Integer(to_i64(start, "within.start")?));
            bind_values.push(Value::Integer(to_i64(end, "within.end")?));
        }

        if query.document_uuid.is_some() {
            sql.push_str(" ORDER BY start_position ASC, rowid ASC");
        } else {
            sql.push_str(" ORDER BY rowid ASC");
        }

        // Substring matching runs after SQL so it follows Unicode case
        // folding; paging then has to wait for the filter too.
        let needle = query
            .text_contains
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_lowercase);
        if needle.is_none() {
            push_paging(&mut sql, &mut bind_values, query.limit, query.offset);
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut annotations = Vec::new();
        while let Some(row) = rows.next()? {
            annotations.push(parse_annotation_row(row)?);
        }

        let Some(needle) = needle else {
            return Ok(annotations);
        };
        let matching = annotations
            .into_iter()
            .filter(|annotation| contains_ignore_case(&annotation.selected_text, &needle))
            .skip(query.offset as usize);
        Ok(match query.limit {
            Some(limit) => matching.take(limit as usize).collect(),
            None => matching.collect(),
        })
    }

    fn count_annotations(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM annotations;", [], |row| row.get(0))?;
        to_u64(count, "annotations.count")
    }

    fn count_by_label(&self) -> RepoResult<Vec<LabelCount>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LABEL_COLUMNS_SQL}, COUNT(a.uuid) AS item_count
             FROM annotations a
             JOIN labels l ON l.uuid = a.label_uuid
             GROUP BY l.uuid
             ORDER BY item_count DESC, MIN(l.rowid) ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_label_count_row(row)?);
        }
        Ok(items)
    }

    fn count_by_document(&self) -> RepoResult<Vec<DocumentCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.uuid, d.name, COUNT(a.uuid) AS item_count
             FROM annotations a
             JOIN documents d ON d.uuid = a.document_uuid
             GROUP BY d.uuid
             ORDER BY item_count DESC, MIN(d.rowid) ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get(0)?;
            let count: i64 = row.get(2)?;
            items.push(DocumentCount {
                document_uuid: parse_uuid(&uuid_text, "documents.uuid")?,
                document_name: row.get(1)?,
                count: to_u64(count, "item_count")?,
            });
        }
        Ok(items)
    }

    fn concentration(
        &self,
        label: LabelId,
        proximity: usize,
        limit: Option<usize>,
    ) -> RepoResult<Vec<DocumentScore>> {
        // Ordered pairs, self-pairs included: (a, a) always scores when the
        // span is shorter than `proximity`, and (a, b) and (b, a) count
        // separately.
        let mut stmt = self.conn.prepare(
            "SELECT d.uuid, d.name, COUNT(*) AS score
             FROM annotations a1
             JOIN annotations a2
               ON a2.document_uuid = a1.document_uuid
              AND a2.label_uuid = a1.label_uuid
             JOIN documents d ON d.uuid = a1.document_uuid
             WHERE a1.label_uuid = ?1
               AND ABS(a1.start_position - a2.end_position) <= ?2
             GROUP BY d.uuid
             ORDER BY score DESC, MIN(d.rowid) ASC
             LIMIT ?3;",
        )?;
        let limit = match limit {
            Some(limit) => to_i64(limit, "limit")?,
            None => -1,
        };
        let mut rows = stmt.query(params![
            label.to_string(),
            to_i64(proximity, "proximity")?,
            limit
        ])?;
        let mut scores = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get(0)?;
            let score: i64 = row.get(2)?;
            scores.push(DocumentScore {
                document_uuid: parse_uuid(&uuid_text, "documents.uuid")?,
                document_name: row.get(1)?,
                score: to_u64(score, "score")?,
            });
        }
        Ok(scores)
    }

    fn document_text(&self, document: DocumentId) -> RepoResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT content FROM documents WHERE uuid = ?1;")?;
        let mut rows = stmt.query([document.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(row.get(0)?));
        }
        Ok(None)
    }

    fn label_exists(&self, id: LabelId) -> RepoResult<bool> {
        label_repo::label_exists(self.conn, id)
    }
}

fn push_paging(sql: &mut String, bind_values: &mut Vec<Value>, limit: Option<u32>, offset: u32) {
    if let Some(limit) = limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(offset)));
        }
    } else if offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        bind_values.push(Value::Integer(i64::from(offset)));
    }
}

fn parse_annotation_row(row: &Row<'_>) -> RepoResult<Annotation> {
    let uuid_text: String = row.get(0)?;
    let document_text: String = row.get(1)?;
    let label_text: String = row.get(2)?;
    let start: i64 = row.get(3)?;
    let end: i64 = row.get(4)?;
    Ok(Annotation {
        uuid: parse_uuid(&uuid_text, "annotations.uuid")?,
        document_uuid: parse_uuid(&document_text, "annotations.document_uuid")?,
        label_uuid: parse_uuid(&label_text, "annotations.label_uuid")?,
        start_position: to_usize(start, "annotations.start_position")?,
        end_position: to_usize(end, "annotations.end_position")?,
        selected_text: row.get(5)?,
        context_before: row.get(6)?,
        context_after: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn not_found(id: AnnotationId) -> RepoError {
    RepoError::NotFound {
        entity: EntityKind::Annotation,
        id,
    }
}
