//! User record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hearth_storage::{Row, StoreError};

pub type UserId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Assigned by the engine on insert
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// Assigned by the engine on insert
    pub created_at: DateTime<Utc>,
}

impl User {
    pub(crate) fn from_row(row: &Row) -> Result<Self, StoreError> {
        let created_str: String = row.get("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                StoreError::Storage(format!("invalid created_at '{created_str}': {e}"))
            })?;

        Ok(User {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            created_at,
        })
    }
}
