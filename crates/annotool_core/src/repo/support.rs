//! SQLite helpers shared by repository implementations.

use crate::db::migrations::{current_user_version, latest_version};
use crate::repo::error::{RepoError, RepoResult};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

/// SQL expression for "now" in epoch milliseconds.
pub(crate) const NOW_MS_SQL: &str = "(strftime('%s', 'now') * 1000)";

/// Runs `op` inside one `BEGIN IMMEDIATE` transaction on `conn`.
///
/// The write lock is taken before `op` reads anything, so validation and
/// mutation done inside `op` cannot interleave with another writer. Any
/// error rolls the whole scope back.
pub(crate) fn immediate_scope<T, E, F>(conn: &Connection, op: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<RepoError>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(RepoError::from)?;
    let value = op()?;
    tx.commit().map_err(RepoError::from)?;
    Ok(value)
}

/// Verifies migration version and required tables before a repository is
/// handed out.
pub(crate) fn ensure_connection_ready(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(
    value: Option<String>,
    column: &'static str,
) -> RepoResult<Option<Uuid>> {
    value.map(|text| parse_uuid(&text, column)).transpose()
}

/// Converts a stored offset/count back to `usize`, rejecting negatives.
pub(crate) fn to_usize(value: i64, column: &'static str) -> RepoResult<usize> {
    usize::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative value `{value}` in {column}")))
}

pub(crate) fn to_u64(value: i64, column: &'static str) -> RepoResult<u64> {
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative value `{value}` in {column}")))
}

/// Converts an offset to the SQLite integer type.
pub(crate) fn to_i64(value: usize, field: &'static str) -> RepoResult<i64> {
    i64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("value `{value}` for {field} exceeds i64")))
}

/// Case-insensitive substring match over Unicode lowercase forms.
pub(crate) fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

pub(crate) fn exists(conn: &Connection, sql: &str, id: Uuid) -> RepoResult<bool> {
    let found: i64 = conn.query_row(sql, [id.to_string()], |row| row.get(0))?;
    Ok(found == 1)
}
