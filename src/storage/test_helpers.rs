//! Shared test helpers for storage module tests.

#[cfg(test)]
use sqlx::{Connection, SqliteConnection};

/// Opens a private in-memory connection for SQL-level tests.
#[cfg(test)]
pub async fn create_test_connection() -> SqliteConnection {
    SqliteConnection::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory test database")
}
