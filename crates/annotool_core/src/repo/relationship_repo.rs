//! Label relationship repository contracts and SQLite implementation.
//!
//! Relationships are one edge list keyed by id. The source and target
//! indices are plain SQL indices, so there is no per-label back reference
//! to keep in sync.

use crate::model::label::{LabelCount, LabelId};
use crate::model::relationship::{
    EdgeDirection, LabelRelationship, NewRelationship, RelationshipId,
};
use crate::repo::error::{EntityKind, RepoError, RepoResult};
use crate::repo::label_repo::{self, parse_label_count_row, LABEL_COLUMNS_SQL};
use crate::repo::support::{ensure_connection_ready, immediate_scope, parse_uuid, to_i64, to_u64};
use crate::repo::WriteScope;
use rusqlite::{params, Connection, Row};

const RELATIONSHIP_SELECT_SQL: &str = "SELECT
    uuid,
    source_uuid,
    target_uuid,
    description,
    created_at
FROM label_relationships";

/// Repository interface for directed label relationships.
pub trait RelationshipRepository: WriteScope {
    fn insert_relationship(&self, draft: &NewRelationship) -> RepoResult<LabelRelationship>;
    fn get_relationship(&self, id: RelationshipId) -> RepoResult<Option<LabelRelationship>>;
    /// Loads the edge for one exact ordered pair.
    fn find_by_pair(
        &self,
        source: LabelId,
        target: LabelId,
    ) -> RepoResult<Option<LabelRelationship>>;
    fn update_description(&self, id: RelationshipId, description: Option<&str>)
        -> RepoResult<()>;
    fn delete_relationship(&self, id: RelationshipId) -> RepoResult<()>;
    /// Lists every edge in insertion order.
    fn list_relationships(&self) -> RepoResult<Vec<LabelRelationship>>;
    fn outgoing(&self, label: LabelId) -> RepoResult<Vec<LabelRelationship>>;
    fn incoming(&self, label: LabelId) -> RepoResult<Vec<LabelRelationship>>;
    /// Outgoing and incoming edges of one label, in insertion order.
    fn for_label(&self, label: LabelId) -> RepoResult<Vec<LabelRelationship>>;
    fn count_relationships(&self) -> RepoResult<u64>;
    /// Labels ranked by degree in `direction`; ties by label insertion order.
    fn most_connected(&self, direction: EdgeDirection, limit: usize)
        -> RepoResult<Vec<LabelCount>>;
    fn label_exists(&self, id: LabelId) -> RepoResult<bool>;
}

/// SQLite-backed relationship repository.
pub struct SqliteRelationshipRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRelationshipRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["labels", "label_relationships"])?;
        Ok(Self { conn })
    }

    fn query_edges(&self, sql: &str, label: Option<LabelId>) -> RepoResult<Vec<LabelRelationship>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = match label {
            Some(label) => stmt.query([label.to_string()])?,
            None => stmt.query([])?,
        };
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            edges.push(parse_relationship_row(row)?);
        }
        Ok(edges)
    }
}

impl WriteScope for SqliteRelationshipRepository<'_> {
    fn write_scope<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        immediate_scope(self.conn, op)
    }
}

impl RelationshipRepository for SqliteRelationshipRepository<'_> {
    fn insert_relationship(&self, draft: &NewRelationship) -> RepoResult<LabelRelationship> {
        self.conn.execute(
            "INSERT INTO label_relationships (uuid, source_uuid, target_uuid, description)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                draft.uuid.to_string(),
                draft.source_uuid.to_string(),
                draft.target_uuid.to_string(),
                draft.description.as_deref(),
            ],
        )?;
        self.get_relationship(draft.uuid)?
            .ok_or(RepoError::NotFound {
                entity: EntityKind::Relationship,
                id: draft.uuid,
            })
    }

    fn get_relationship(&self, id: RelationshipId) -> RepoResult<Option<LabelRelationship>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RELATIONSHIP_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_relationship_row(row)?));
        }
        Ok(None)
    }

    fn find_by_pair(
        &self,
        source: LabelId,
        target: LabelId,
    ) -> RepoResult<Option<LabelRelationship>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RELATIONSHIP_SELECT_SQL} WHERE source_uuid = ?1 AND target_uuid = ?2;"
        ))?;
        let mut rows = stmt.query([source.to_string(), target.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_relationship_row(row)?));
        }
        Ok(None)
    }

    fn update_description(
        &self,
        id: RelationshipId,
        description: Option<&str>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE label_relationships SET description = ?2 WHERE uuid = ?1;",
            params![id.to_string(), description],
        )?;
        ensure_changed(changed, id)
    }

    fn delete_relationship(&self, id: RelationshipId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM label_relationships WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        ensure_changed(changed, id)
    }

    fn list_relationships(&self) -> RepoResult<Vec<LabelRelationship>> {
        self.query_edges(&format!("{RELATIONSHIP_SELECT_SQL} ORDER BY rowid ASC;"), None)
    }

    fn outgoing(&self, label: LabelId) -> RepoResult<Vec<LabelRelationship>> {
        self.query_edges(
            &format!("{RELATIONSHIP_SELECT_SQL} WHERE source_uuid = ?1 ORDER BY rowid ASC;"),
            Some(label),
        )
    }

    fn incoming(&self, label: LabelId) -> RepoResult<Vec<LabelRelationship>> {
        self.query_edges(
            &format!("{RELATIONSHIP_SELECT_SQL} WHERE target_uuid = ?1 ORDER BY rowid ASC;"),
            Some(label),
        )
    }

    fn for_label(&self, label: LabelId) -> RepoResult<Vec<LabelRelationship>> {
        self.query_edges(
            &format!(
                "{RELATIONSHIP_SELECT_SQL}
                 WHERE source_uuid = ?1 OR target_uuid = ?1
                 ORDER BY rowid ASC;"
            ),
            Some(label),
        )
    }

    fn count_relationships(&self) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM label_relationships;",
            [],
            |row| row.get(0),
        )?;
        to_u64(count, "label_relationships.count")
    }

    fn most_connected(
        &self,
        direction: EdgeDirection,
        limit: usize,
    ) -> RepoResult<Vec<LabelCount>> {
        let endpoint = match direction {
            EdgeDirection::Outgoing => "source_uuid",
            EdgeDirection::Incoming => "target_uuid",
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LABEL_COLUMNS_SQL}, COUNT(r.uuid) AS item_count
             FROM labels l
             JOIN label_relationships r ON r.{endpoint} = l.uuid
             GROUP BY l.uuid
             ORDER BY item_count DESC, MIN(l.rowid) ASC
             LIMIT ?1;"
        ))?;
        let mut rows = stmt.query([to_i64(limit, "limit")?])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_label_count_row(row)?);
        }
        Ok(items)
    }

    fn label_exists(&self, id: LabelId) -> RepoResult<bool> {
        label_repo::label_exists(self.conn, id)
    }
}

fn parse_relationship_row(row: &Row<'_>) -> RepoResult<LabelRelationship> {
    let uuid_text: String = row.get(0)?;
    let source_text: String = row.get(1)?;
    let target_text: String = row.get(2)?;
    Ok(LabelRelationship {
        uuid: parse_uuid(&uuid_text, "label_relationships.uuid")?,
        source_uuid: parse_uuid(&source_text, "label_relationships.source_uuid")?,
        target_uuid: parse_uuid(&target_text, "label_relationships.target_uuid")?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn ensure_changed(changed: usize, id: RelationshipId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: EntityKind::Relationship,
            id,
        });
    }
    Ok(())
}
