//! Document repository contracts and SQLite implementation.
//!
//! Content is written once on insert. The only mutable column is `name`.

use crate::model::document::{
    Document, DocumentCount, DocumentId, FileType, FileTypeCount, NewDocument,
};
use crate::repo::error::{EntityKind, RepoError, RepoResult};
use crate::repo::support::{
    contains_ignore_case, ensure_connection_ready, immediate_scope, parse_uuid, to_i64, to_u64,
};
use crate::repo::WriteScope;
use rusqlite::{params, Connection, Row};

const DOCUMENT_SELECT_SQL: &str = "SELECT
    d.uuid,
    d.name,
    d.original_filename,
    d.file_type,
    d.content,
    d.file_size,
    d.uploaded_at
FROM documents d";

const NEWEST_FIRST_SQL: &str = "ORDER BY d.uploaded_at DESC, d.rowid DESC";

/// Text field targeted by a document search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSearchField {
    Name,
    Content,
}

/// Repository interface for imported documents.
pub trait DocumentRepository: WriteScope {
    fn insert_document(&self, draft: &NewDocument) -> RepoResult<Document>;
    fn get_document(&self, id: DocumentId) -> RepoResult<Option<Document>>;
    /// Lists documents, newest upload first.
    fn list_documents(&self) -> RepoResult<Vec<Document>>;
    fn list_by_file_type(&self, file_type: FileType) -> RepoResult<Vec<Document>>;
    /// Case-insensitive substring search, newest first.
    fn search_documents(
        &self,
        field: DocumentSearchField,
        needle: &str,
    ) -> RepoResult<Vec<Document>>;
    fn rename_document(&self, id: DocumentId, name: &str) -> RepoResult<()>;
    fn delete_document(&self, id: DocumentId) -> RepoResult<()>;
    fn count_documents(&self) -> RepoResult<u64>;
    /// Document counts per file type, descending, only types present.
    fn count_by_file_type(&self) -> RepoResult<Vec<FileTypeCount>>;
    /// Every document with its annotation count, zeros included, descending.
    fn annotation_counts(&self, limit: Option<usize>) -> RepoResult<Vec<DocumentCount>>;
    /// Documents no annotation points into, newest first.
    fn without_annotations(&self) -> RepoResult<Vec<Document>>;
}

/// SQLite-backed document repository.
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["documents", "annotations"])?;
        Ok(Self { conn })
    }

    fn query_documents(&self, sql: &str, key: Option<&str>) -> RepoResult<Vec<Document>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = match key {
            Some(key) => stmt.query([key])?,
            None => stmt.query([])?,
        };
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(row)?);
        }
        Ok(documents)
    }
}

impl WriteScope for SqliteDocumentRepository<'_> {
    fn write_scope<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        immediate_scope(self.conn, op)
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn insert_document(&self, draft: &NewDocument) -> RepoResult<Document> {
        self.conn.execute(
            "INSERT INTO documents (
                uuid,
                name,
                original_filename,
                file_type,
                content,
                file_size
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                draft.uuid.to_string(),
                draft.name.as_str(),
                draft.original_filename.as_str(),
                draft.file_type.as_str(),
                draft.content.as_str(),
                draft.file_size,
            ],
        )?;
        self.get_document(draft.uuid)?
            .ok_or_else(|| not_found(draft.uuid))
    }

    fn get_document(&self, id: DocumentId) -> RepoResult<Option<Document>> {
        let mut documents = self.query_documents(
            &format!("{DOCUMENT_SELECT_SQL} WHERE d.uuid = ?1;"),
            Some(&id.to_string()),
        )?;
        Ok(documents.pop())
    }

    fn list_documents(&self) -> RepoResult<Vec<Document>> {
        self.query_documents(&format!("{DOCUMENT_SELECT_SQL} {NEWEST_FIRST_SQL};"), None)
    }

    fn list_by_file_type(&self, file_type: FileType) -> RepoResult<Vec<Document>> {
        self.query_documents(
            &format!("{DOCUMENT_SELECT_SQL} WHERE d.file_type = ?1 {NEWEST_FIRST_SQL};"),
            Some(file_type.as_str()),
        )
    }

    fn search_documents(
        &self,
        field: DocumentSearchField,
        needle: &str,
    ) -> RepoResult<Vec<Document>> {
        let needle = needle.trim().to_lowercase();
        let documents = self.list_documents()?;
        if needle.is_empty() {
            return Ok(documents);
        }
        Ok(documents
            .into_iter()
            .filter(|document| {
                let haystack = match field {
                    DocumentSearchField::Name => &document.name,
                    DocumentSearchField::Content => &document.content,
                };
                contains_ignore_case(haystack, &needle)
            })
            .collect())
    }

    fn rename_document(&self, id: DocumentId, name: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents SET name = ?2 WHERE uuid = ?1;",
            params![id.to_string(), name],
        )?;
        if changed == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    fn delete_document(&self, id: DocumentId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM documents WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    fn count_documents(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents;", [], |row| row.get(0))?;
        to_u64(count, "documents.count")
    }

    fn count_by_file_type(&self) -> RepoResult<Vec<FileTypeCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_type, COUNT(*) AS item_count
             FROM documents
             GROUP BY file_type
             ORDER BY item_count DESC, file_type ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let file_type: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            items.push(FileTypeCount {
                file_type: parse_file_type(&file_type)?,
                count: to_u64(count, "item_count")?,
            });
        }
        Ok(items)
    }

    fn annotation_counts(&self, limit: Option<usize>) -> RepoResult<Vec<DocumentCount>> {
        let limit = match limit {
            Some(limit) => to_i64(limit, "limit")?,
            None => -1,
        };
        let mut stmt = self.conn.prepare(
            "SELECT d.uuid, d.name, COUNT(a.uuid) AS item_count
             FROM documents d
             LEFT JOIN annotations a ON a.document_uuid = d.uuid
             GROUP BY d.uuid
             ORDER BY item_count DESC, MIN(d.rowid) ASC
             LIMIT ?1;",
        )?;
        let mut rows = stmt.query([limit])?;
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

    fn without_annotations(&self) -> RepoResult<Vec<Document>> {
        self.query_documents(
            &format!(
                "{DOCUMENT_SELECT_SQL}
                 WHERE NOT EXISTS (
                    SELECT 1 FROM annotations a WHERE a.document_uuid = d.uuid
                 )
                 {NEWEST_FIRST_SQL};"
            ),
            None,
        )
    }
}

fn parse_document_row(row: &Row<'_>) -> RepoResult<Document> {
    let uuid_text: String = row.get(0)?;
    let file_type: String = row.get(3)?;
    Ok(Document {
        uuid: parse_uuid(&uuid_text, "documents.uuid")?,
        name: row.get(1)?,
        original_filename: row.get(2)?,
        file_type: parse_file_type(&file_type)?,
        content: row.get(4)?,
        file_size: row.get(5)?,
        uploaded_at: row.get(6)?,
    })
}

fn parse_file_type(value: &str) -> RepoResult<FileType> {
    FileType::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid file_type `{value}` in documents.file_type"))
    })
}

fn not_found(id: DocumentId) -> RepoError {
    RepoError::NotFound {
        entity: EntityKind::Document,
        id,
    }
}
