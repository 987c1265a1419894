//! User Manager
//!
//! Every statement binds its values as parameters. A missing id is not an
//! error: lookups return `None` and writes report zero affected rows.

use hearth_storage::{Connection, Result, Value};

use crate::user::{User, UserId};

const SELECT_COLUMNS: &str = "SELECT id, name, email, created_at FROM users";

pub struct UserManager {
    conn: Connection,
}

impl UserManager {
    /// Wrap a connection that is open and has its schema in place.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert a user. Fails with `Constraint` if the email is taken or a
    /// field is blank.
    pub async fn add(&self, name: &str, email: &str) -> Result<UserId> {
        let result = self
            .conn
            .run(
                "INSERT INTO users (name, email) VALUES (?1, ?2)",
                vec![text(name), text(email)],
            )
            .await?;

        tracing::info!(user_id = result.last_id, "Added user");
        Ok(result.last_id)
    }

    /// All users, newest first.
    pub async fn list(&self) -> Result<Vec<User>> {
        let rows = self
            .conn
            .query(
                &format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC"),
                vec![],
            )
            .await?;

        rows.iter().map(User::from_row).collect()
    }

    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>> {
        let rows = self
            .conn
            .query(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                vec![Value::Integer(id)],
            )
            .await?;

        rows.first().map(User::from_row).transpose()
    }

    /// Replace name and email. Returns the number of rows changed.
    pub async fn update(&self, id: UserId, name: &str, email: &str) -> Result<usize> {
        let result = self
            .conn
            .run(
                "UPDATE users SET name = ?1, email = ?2 WHERE id = ?3",
                vec![text(name), text(email), Value::Integer(id)],
            )
            .await?;

        tracing::debug!(user_id = id, changes = result.changes, "Updated user");
        Ok(result.changes)
    }

    /// Returns the number of rows removed.
    pub async fn delete(&self, id: UserId) -> Result<usize> {
        let result = self
            .conn
            .run("DELETE FROM users WHERE id = ?1", vec![Value::Integer(id)])
            .await?;

        tracing::debug!(user_id = id, changes = result.changes, "Deleted user");
        Ok(result.changes)
    }

    pub async fn count(&self) -> Result<u64> {
        let rows = self
            .conn
            .query("SELECT COUNT(*) AS count FROM users", vec![])
            .await?;

        match rows.first() {
            Some(row) => Ok(row.get::<i64>("count")? as u64),
            None => Ok(0),
        }
    }
}

impl Clone for UserManager {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}
