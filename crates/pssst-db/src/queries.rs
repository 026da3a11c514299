use crate::Database;
use crate::models::UserRow;
use anyhow::{Context, Result};
use pssst_types::UserRecord;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn get_user(&self, name: &str) -> Result<Option<UserRecord>> {
        let row = self.with_conn(|conn| query_user(conn, name))?;

        row.map(|row| {
            serde_json::from_str(&row.record)
                .with_context(|| format!("Corrupt record for user '{}'", row.name))
        })
        .transpose()
    }

    /// Insert or replace the whole record stored under `name`.
    pub fn put_user(&self, name: &str, record: &UserRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (name, record) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET record = excluded.record, updated_at = datetime('now')",
                (name, &json),
            )?;
            Ok(())
        })
    }

    pub fn get_user_row(&self, name: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, name))
    }

    pub fn count_users(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }
}

fn query_user(conn: &Connection, name: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT name, record, created_at, updated_at FROM users WHERE name = ?1")?;

    let row = stmt
        .query_row([name], |row| {
            Ok(UserRow {
                name: row.get(0)?,
                record: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
