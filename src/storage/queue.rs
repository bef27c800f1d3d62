//! Per-queue SQL.
//!
//! Each queue is one table `(id INTEGER PRIMARY KEY AUTOINCREMENT, data BLOB NOT NULL)`.
//! These functions run on the store executor only; they take the connection
//! directly and never lock anything themselves.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use sqlx::{Connection, Row, SqliteConnection};

use crate::config::MAX_QUEUE_NAME_LEN;
use crate::error_handling::StoreError;

use super::models::{Record, RecordId};

static QUEUE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("static pattern"));

/// Checks that `queue` can safely be used as a table name.
///
/// Queue names are interpolated into SQL, so only identifier characters are
/// accepted, and SQLite's reserved `sqlite_` prefix is refused. Uppercase is
/// refused too: SQLite table names ignore case, so `events` and `EVENTS`
/// would share one table.
pub fn validate_queue_name(queue: &str) -> Result<(), StoreError> {
    if queue.len() > MAX_QUEUE_NAME_LEN
        || !QUEUE_NAME.is_match(queue)
        || queue.starts_with("sqlite_")
    {
        return Err(StoreError::InvalidQueueName(queue.to_string()));
    }
    Ok(())
}

pub(crate) async fn create_table(conn: &mut SqliteConnection, queue: &str) -> Result<(), StoreError> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS \"{queue}\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            data BLOB NOT NULL
        )"
    ))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn table_exists(conn: &mut SqliteConnection, queue: &str) -> Result<bool, StoreError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?")
            .bind(queue)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count > 0)
}

/// Inserts `blobs` and trims the queue to `limit`, in one transaction.
///
/// Returns the number of evicted records. On error the transaction is rolled
/// back, so either every blob is stored (and the queue trimmed) or nothing is.
pub(crate) async fn insert_blobs(
    conn: &mut SqliteConnection,
    queue: &str,
    blobs: &[Vec<u8>],
    limit: u32,
) -> Result<u64, StoreError> {
    let mut tx = conn.begin().await?;

    let insert = format!("INSERT INTO \"{queue}\" (data) VALUES (?)");
    for blob in blobs {
        sqlx::query(&insert)
            .bind(blob.as_slice())
            .execute(&mut *tx)
            .await?;
    }

    // Oldest first: keep only the `limit` highest ids
    let evicted = sqlx::query(&format!(
        "DELETE FROM \"{queue}\" WHERE id NOT IN (SELECT id FROM \"{queue}\" ORDER BY id DESC LIMIT ?)"
    ))
    .bind(i64::from(limit))
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    Ok(evicted)
}

/// Reads up to `max_count` records in ascending id order, skipping `exclude`.
///
/// At most `exclude.len()` of the oldest rows can be skipped, so reading a
/// window of `max_count + exclude.len()` rows is always enough.
pub(crate) async fn fetch_records(
    conn: &mut SqliteConnection,
    queue: &str,
    max_count: usize,
    exclude: &HashSet<RecordId>,
) -> Result<Vec<Record>, StoreError> {
    if max_count == 0 {
        return Ok(Vec::new());
    }

    let window = i64::try_from(max_count.saturating_add(exclude.len())).unwrap_or(i64::MAX);
    let rows = sqlx::query(&format!(
        "SELECT id, data FROM \"{queue}\" ORDER BY id ASC LIMIT ?"
    ))
    .bind(window)
    .fetch_all(&mut *conn)
    .await?;

    let mut records = Vec::with_capacity(max_count.min(rows.len()));
    for row in rows {
        let id: RecordId = row.try_get("id")?;
        if exclude.contains(&id) {
            continue;
        }
        let data: Vec<u8> = row.try_get("data")?;
        records.push(Record { id, data });
        if records.len() == max_count {
            break;
        }
    }
    Ok(records)
}

/// Deletes records by id in one transaction. Unknown ids are ignored.
pub(crate) async fn delete_records(
    conn: &mut SqliteConnection,
    queue: &str,
    ids: &[RecordId],
) -> Result<u64, StoreError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut tx = conn.begin().await?;
    let delete = format!("DELETE FROM \"{queue}\" WHERE id = ?");
    let mut deleted = 0;
    for id in ids {
        deleted += sqlx::query(&delete)
            .bind(*id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;
    Ok(deleted)
}

pub(crate) async fn count_records(conn: &mut SqliteConnection, queue: &str) -> Result<u64, StoreError> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{queue}\""))
        .fetch_one(&mut *conn)
        .await?;
    Ok(u64::try_from(count).unwrap_or(0))
}
