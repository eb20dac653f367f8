//! SQLite pool construction. Connection behavior (WAL, foreign keys, busy
//! handler) is set through the connect options so every pooled connection
//! behaves the same without per-connection setup queries.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use minuteman_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Open a pool against `config.url`, creating the database file on first
/// use. Foreign keys are enforced on every connection and writes go through
/// WAL so a chat session can keep reading while a record is being saved.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .connect_with(options)
        .await
}

#[cfg(test)]
pub(crate) async fn connect_in_memory() -> DbPool {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        timeout_secs: 5,
        busy_timeout_ms: 100,
    };
    connect(&config).await.expect("in-memory pool")
}
