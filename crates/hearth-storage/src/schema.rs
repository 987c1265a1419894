//! Schema bootstrap
//!
//! Runs once per opened connection, before the handle reaches the data
//! access layer. Every statement is "create if absent", so running it again
//! never changes the table or its rows.

use crate::connection::Connection;
use crate::error::StoreError;
use crate::Result;

pub const USERS_TABLE: &str = "users";

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL CHECK (length(trim(name)) > 0),
        email TEXT NOT NULL UNIQUE CHECK (length(trim(email)) > 0),
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at);
"#;

pub async fn ensure_schema(conn: &Connection) -> Result<()> {
    if conn.is_readonly() {
        // Nothing can be created; the table has to be there already
        if !table_exists(conn, USERS_TABLE).await? {
            return Err(StoreError::Schema(format!(
                "read-only database '{}' has no {USERS_TABLE} table",
                conn.name()
            )));
        }
        return Ok(());
    }

    conn.execute(CREATE_USERS).await.map_err(schema_error)?;

    let current = user_version(conn).await?;
    if current < conn.version() {
        conn.execute(&format!("PRAGMA user_version = {}", conn.version()))
            .await
            .map_err(schema_error)?;
        tracing::info!(
            database = %conn.name(),
            from = current,
            to = conn.version(),
            "Recorded schema version"
        );
    }

    tracing::debug!(database = %conn.name(), "Schema ready");
    Ok(())
}

async fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let rows = conn
        .query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            vec![table.to_string().into()],
        )
        .await
        .map_err(schema_error)?;
    Ok(!rows.is_empty())
}

async fn user_version(conn: &Connection) -> Result<i32> {
    let rows = conn
        .query("PRAGMA user_version", vec![])
        .await
        .map_err(schema_error)?;

    match rows.first() {
        Some(row) => row.get("user_version").map_err(schema_error),
        None => Ok(0),
    }
}

fn schema_error(error: StoreError) -> StoreError {
    match error {
        StoreError::ClosedConnection(_) | StoreError::Schema(_) => error,
        other => StoreError::Schema(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionOptions;
    use crate::manager::ConnectionManager;
    use crate::native::NativeBackend;
    use hearth_platform::ReadinessGate;
    use rusqlite::types::Value;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open(manager: &ConnectionManager, options: ConnectionOptions) -> Connection {
        let conn = manager.create_connection(options).unwrap();
        manager.open(&conn).await.unwrap();
        conn
    }

    fn manager() -> ConnectionManager {
        ConnectionManager::new(
            Arc::new(NativeBackend::in_memory()),
            Arc::new(ReadinessGate::native()),
        )
    }

    async fn table_sql(conn: &Connection) -> String {
        conn.query(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            vec![Value::Text(USERS_TABLE.into())],
        )
        .await
        .unwrap()[0]
            .get("sql")
            .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let manager = manager();
        let conn = open(&manager, ConnectionOptions::new("app")).await;

        ensure_schema(&conn).await.unwrap();
        let definition = table_sql(&conn).await;
        conn.run(
            "INSERT INTO users (name, email) VALUES (?1, ?2)",
            vec![Value::Text("Ada".into()), Value::Text("ada@x.io".into())],
        )
        .await
        .unwrap();

        ensure_schema(&conn).await.unwrap();

        assert_eq!(table_sql(&conn).await, definition);
        let rows = conn
            .query("SELECT name, email FROM users", vec![])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String>("email").unwrap(), "ada@x.io");
    }

    #[tokio::test]
    async fn test_schema_version_only_moves_forward() {
        let manager = manager();
        let conn = open(&manager, ConnectionOptions::new("app").with_version(3)).await;

        ensure_schema(&conn).await.unwrap();
        assert_eq!(user_version(&conn).await.unwrap(), 3);

        conn.execute("PRAGMA user_version = 5").await.unwrap();
        ensure_schema(&conn).await.unwrap();
        assert_eq!(user_version(&conn).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_closed_connection_passes_through() {
        let manager = manager();
        let conn = open(&manager, ConnectionOptions::new("app")).await;
        manager.close(&conn).await.unwrap();

        let err = ensure_schema(&conn).await.unwrap_err();
        assert!(matches!(err, StoreError::ClosedConnection(_)));
    }

    #[tokio::test]
    async fn test_failed_statement_is_schema_error() {
        let manager = manager();
        let conn = open(&manager, ConnectionOptions::new("app")).await;
        // An incompatible object already holds the name
        conn.execute("CREATE VIEW users AS SELECT 1 AS id").await.unwrap();

        let err = ensure_schema(&conn).await.unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
    }

    #[tokio::test]
    async fn test_readonly_requires_existing_table() {
        let dir = TempDir::new().unwrap();
        let manager = ConnectionManager::new(
            Arc::new(NativeBackend::new(dir.path())),
            Arc::new(ReadinessGate::native()),
        );

        let seed = rusqlite::Connection::open(dir.path().join("emptySQLite.db")).unwrap();
        seed.execute_batch("CREATE TABLE other (v INTEGER);").unwrap();
        seed.close().unwrap();

        let conn = open(&manager, ConnectionOptions::new("empty").readonly(true)).await;
        let err = ensure_schema(&conn).await.unwrap_err();
        assert!(matches!(err, StoreError::Schema(ref msg) if msg.contains("read-only")));
    }
}
