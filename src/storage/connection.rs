//! Database connection management.
//!
//! The store owns exactly one SQLite connection for its whole lifetime. This
//! module opens it with:
//! - Automatic database file creation
//! - WAL mode enabled
//! - Fallback to an in-memory database when the file cannot be used

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{error, info};
use sqlx::{Connection, SqliteConnection};

use crate::error_handling::StoreError;

/// Where the store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A SQLite file, created if missing.
    File(PathBuf),
    /// A private in-memory database, lost when the store closes.
    Memory,
}

impl StoreLocation {
    /// File location when a path is given, in-memory otherwise.
    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(p) => StoreLocation::File(p.to_path_buf()),
            None => StoreLocation::Memory,
        }
    }
}

/// Opens the store connection for `location`.
///
/// A file that cannot be created or opened is logged and replaced by an
/// in-memory database, so telemetry keeps flowing for the lifetime of the
/// process even on a broken disk.
pub(crate) async fn open_connection(
    location: &StoreLocation,
) -> Result<SqliteConnection, StoreError> {
    match location {
        StoreLocation::Memory => connect_in_memory().await,
        StoreLocation::File(path) => match connect_file(path).await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                error!(
                    "Failed to open database {}: {e}. Using in-memory database.",
                    path.display()
                );
                connect_in_memory().await
            }
        },
    }
}

async fn connect_file(db_path: &Path) -> Result<SqliteConnection, StoreError> {
    let db_path_str = db_path.to_string_lossy().to_string();
    match OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(&db_path_str)
    {
        Ok(_) => info!("Database file {db_path_str} created."),
        Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {
            info!("Database file {db_path_str} already exists.")
        }
        Err(e) => {
            return Err(StoreError::FileCreation(e.to_string()));
        }
    }

    let mut conn = SqliteConnection::connect(&format!("sqlite:{}", db_path_str)).await?;

    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(&mut conn)
        .await?;

    Ok(conn)
}

async fn connect_in_memory() -> Result<SqliteConnection, StoreError> {
    let conn = SqliteConnection::connect("sqlite::memory:").await?;
    Ok(conn)
}
