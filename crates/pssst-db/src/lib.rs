pub mod memory;
pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use pssst_types::UserRecord;

pub use memory::MemoryStore;

/// The relay's view of persistence: whole user records, by name.
///
/// Implementations do no locking beyond keeping a single call consistent;
/// callers serialize read-modify-write cycles per user.
pub trait Store: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<UserRecord>>;
    fn set(&self, name: &str, record: &UserRecord) -> Result<()>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}

impl Store for Database {
    fn get(&self, name: &str) -> Result<Option<UserRecord>> {
        self.get_user(name)
    }

    fn set(&self, name: &str, record: &UserRecord) -> Result<()> {
        self.put_user(name, record)
    }
}
