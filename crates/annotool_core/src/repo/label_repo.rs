//! Label repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist label records and the parent -> children index.
//! - Answer hierarchy and usage queries without enforcing hierarchy rules;
//!   cycle, uniqueness and delete guards live in the label service.
//!
//! # Invariants
//! - Child listing is deterministic: `sibling_order ASC, rowid ASC`.
//! - A label attached to a parent is appended after its current siblings.
//! - Name lookups are exact and case-sensitive.

use crate::model::label::{Label, LabelCount, LabelId, NewLabel};
use crate::repo::error::{EntityKind, RepoError, RepoResult};
use crate::repo::support::{
    ensure_connection_ready, exists, immediate_scope, parse_optional_uuid, parse_uuid, to_u64,
    NOW_MS_SQL,
};
use crate::repo::WriteScope;
use rusqlite::{params, Connection, Row};

pub(crate) const LABEL_COLUMNS_SQL: &str = "l.uuid AS uuid,
    l.name AS name,
    l.color AS color,
    l.description AS description,
    l.parent_uuid AS parent_uuid,
    l.created_at AS created_at,
    l.updated_at AS updated_at";

/// Repository interface for labels and their hierarchy index.
pub trait LabelRepository: WriteScope {
    /// Inserts one label and returns the stored record.
    fn insert_label(&self, draft: &NewLabel) -> RepoResult<Label>;
    /// Loads one label by id.
    fn get_label(&self, id: LabelId) -> RepoResult<Option<Label>>;
    /// Loads one label by exact name.
    fn find_by_name(&self, name: &str) -> RepoResult<Option<Label>>;
    /// Lists every label in insertion order.
    fn list_labels(&self) -> RepoResult<Vec<Label>>;
    /// Lists labels without parent.
    fn list_roots(&self) -> RepoResult<Vec<Label>>;
    /// Lists direct children in sibling order.
    fn list_children(&self, parent: LabelId) -> RepoResult<Vec<Label>>;
    /// Counts direct children.
    fn count_children(&self, id: LabelId) -> RepoResult<u64>;
    /// Counts all labels.
    fn count_labels(&self) -> RepoResult<u64>;
    /// Attaches a label under `parent`, or detaches it to root for `None`.
    fn set_parent(&self, id: LabelId, parent: Option<LabelId>) -> RepoResult<()>;
    /// Replaces the name.
    fn rename_label(&self, id: LabelId, name: &str) -> RepoResult<()>;
    /// Replaces color and description.
    fn update_appearance(
        &self,
        id: LabelId,
        color: &str,
        description: Option<&str>,
    ) -> RepoResult<()>;
    /// Deletes one label row.
    fn delete_label(&self, id: LabelId) -> RepoResult<()>;
    /// Counts annotations that reference the label.
    fn annotation_count(&self, id: LabelId) -> RepoResult<u64>;
    /// Returns every `(label, parent)` edge in sibling order.
    fn hierarchy_edges(&self) -> RepoResult<Vec<(LabelId, Option<LabelId>)>>;
    /// Every label with its annotation count, zeros included, descending.
    fn label_usage(&self) -> RepoResult<Vec<LabelCount>>;
    /// Labels no annotation references.
    fn unused_labels(&self) -> RepoResult<Vec<Label>>;
}

/// SQLite-backed label repository.
pub struct SqliteLabelRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLabelRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["labels", "annotations"])?;
        Ok(Self { conn })
    }

    fn query_labels(&self, sql: &str, id: Option<LabelId>) -> RepoResult<Vec<Label>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = match id {
            Some(id) => stmt.query([id.to_string()])?,
            None => stmt.query([])?,
        };
        let mut labels = Vec::new();
        while let Some(row) = rows.next()? {
            labels.push(parse_label_row(row)?);
        }
        Ok(labels)
    }

    fn query_one(&self, sql: &str, key: &str) -> RepoResult<Option<Label>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_label_row(row)?));
        }
        Ok(None)
    }
}

impl WriteScope for SqliteLabelRepository<'_> {
    fn write_scope<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        immediate_scope(self.conn, op)
    }
}

impl LabelRepository for SqliteLabelRepository<'_> {
    fn insert_label(&self, draft: &NewLabel) -> RepoResult<Label> {
        let sibling_order = next_sibling_order(self.conn, draft.parent_uuid)?;
        self.conn.execute(
            "INSERT INTO labels (
                uuid,
                name,
                color,
                description,
                parent_uuid,
                sibling_order
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                draft.uuid.to_string(),
                draft.name.as_str(),
                draft.color.as_str(),
                draft.description.as_deref(),
                draft.parent_uuid.map(|value| value.to_string()),
                sibling_order,
            ],
        )?;
        self.get_label(draft.uuid)?.ok_or(RepoError::NotFound {
            entity: EntityKind::Label,
            id: draft.uuid,
        })
    }

    fn get_label(&self, id: LabelId) -> RepoResult<Option<Label>> {
        self.query_one(
            &format!("SELECT {LABEL_COLUMNS_SQL} FROM labels l WHERE l.uuid = ?1;"),
            &id.to_string(),
        )
    }

    fn find_by_name(&self, name: &str) -> RepoResult<Option<Label>> {
        self.query_one(
            &format!("SELECT {LABEL_COLUMNS_SQL} FROM labels l WHERE l.name = ?1;"),
            name,
        )
    }

    fn list_labels(&self) -> RepoResult<Vec<Label>> {
        self.query_labels(
            &format!("SELECT {LABEL_COLUMNS_SQL} FROM labels l ORDER BY l.rowid ASC;"),
            None,
        )
    }

    fn list_roots(&self) -> RepoResult<Vec<Label>> {
        self.query_labels(
            &format!(
                "SELECT {LABEL_COLUMNS_SQL}
                 FROM labels l
                 WHERE l.parent_uuid IS NULL
                 ORDER BY l.sibling_order ASC, l.rowid ASC;"
            ),
            None,
        )
    }

    fn list_children(&self, parent: LabelId) -> RepoResult<Vec<Label>> {
        self.query_labels(
            &format!(
                "SELECT {LABEL_COLUMNS_SQL}
                 FROM labels l
                 WHERE l.parent_uuid = ?1
                 ORDER BY l.sibling_order ASC, l.rowid ASC;"
            ),
            Some(parent),
        )
    }

    fn count_children(&self, id: LabelId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM labels WHERE parent_uuid = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )?;
        to_u64(count, "labels.count")
    }

    fn count_labels(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM labels;", [], |row| row.get(0))?;
        to_u64(count, "labels.count")
    }

    fn set_parent(&self, id: LabelId, parent: Option<LabelId>) -> RepoResult<()> {
        let sibling_order = next_sibling_order(self.conn, parent)?;
        let changed = self.conn.execute(
            &format!(
                "UPDATE labels
                 SET parent_uuid = ?2,
                     sibling_order = ?3,
                     updated_at = {NOW_MS_SQL}
                 WHERE uuid = ?1;"
            ),
            params![
                id.to_string(),
                parent.map(|value| value.to_string()),
                sibling_order
            ],
        )?;
        ensure_changed(changed, id)
    }

    fn rename_label(&self, id: LabelId, name: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE labels
                 SET name = ?2,
                     updated_at = {NOW_MS_SQL}
                 WHERE uuid = ?1;"
            ),
            params![id.to_string(), name],
        )?;
        ensure_changed(changed, id)
    }

    fn update_appearance(
        &self,
        id: LabelId,
        color: &str,
        description: Option<&str>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE labels
                 SET color = ?2,
                     description = ?3,
                     updated_at = {NOW_MS_SQL}
                 WHERE uuid = ?1;"
            ),
            params![id.to_string(), color, description],
        )?;
        ensure_changed(changed, id)
    }

    fn delete_label(&self, id: LabelId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM labels WHERE uuid = ?1;", [id.to_string()])?;
        ensure_changed(changed, id)
    }

    fn annotation_count(&self, id: LabelId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM annotations WHERE label_uuid = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )?;
        to_u64(count, "annotations.count")
    }

    fn hierarchy_edges(&self) -> RepoResult<Vec<(LabelId, Option<LabelId>)>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, parent_uuid
             FROM labels
             ORDER BY sibling_order ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            let id_text: String = row.get(0)?;
            let id = parse_uuid(&id_text, "labels.uuid")?;
            let parent = parse_optional_uuid(row.get(1)?, "labels.parent_uuid")?;
            edges.push((id, parent));
        }
        Ok(edges)
    }

    fn label_usage(&self) -> RepoResult<Vec<LabelCount>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LABEL_COLUMNS_SQL}, COUNT(a.uuid) AS item_count
             FROM labels l
             LEFT JOIN annotations a ON a.label_uuid = l.uuid
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

    fn unused_labels(&self) -> RepoResult<Vec<Label>> {
        self.query_labels(
            &format!(
                "SELECT {LABEL_COLUMNS_SQL}
                 FROM labels l
                 WHERE NOT EXISTS (
                    SELECT 1 FROM annotations a WHERE a.label_uuid = l.uuid
                 )
                 ORDER BY l.rowid ASC;"
            ),
            None,
        )
    }
}

/// Returns whether a label row exists. Shared by stores that reference
/// labels.
pub(crate) fn label_exists(conn: &Connection, id: LabelId) -> RepoResult<bool> {
    exists(
        conn,
        "SELECT EXISTS(SELECT 1 FROM labels WHERE uuid = ?1);",
        id,
    )
}

pub(crate) fn parse_label_row(row: &Row<'_>) -> RepoResult<Label> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Label {
        uuid: parse_uuid(&uuid_text, "labels.uuid")?,
        name: row.get("name")?,
        color: row.get("color")?,
        description: row.get("description")?,
        parent_uuid: parse_optional_uuid(row.get("parent_uuid")?, "labels.parent_uuid")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Parses a row shaped `LABEL_COLUMNS_SQL, item_count`.
pub(crate) fn parse_label_count_row(row: &Row<'_>) -> RepoResult<LabelCount> {
    let count: i64 = row.get("item_count")?;
    Ok(LabelCount {
        label: parse_label_row(row)?,
        count: to_u64(count, "item_count")?,
    })
}

fn next_sibling_order(conn: &Connection, parent: Option<LabelId>) -> RepoResult<i64> {
    let next = match parent {
        Some(parent) => conn.query_row(
            "SELECT COALESCE(MAX(sibling_order), -1) + 1
             FROM labels
             WHERE parent_uuid = ?1;",
            [parent.to_string()],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COALESCE(MAX(sibling_order), -1) + 1
             FROM labels
             WHERE parent_uuid IS NULL;",
            [],
            |row| row.get(0),
        )?,
    };
    Ok(next)
}

fn ensure_changed(changed: usize, id: LabelId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: EntityKind::Label,
            id,
        });
    }
    Ok(())
}
