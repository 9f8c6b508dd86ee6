//! SQLite-backed order store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, params_from_iter, Connection, OpenFlags};

use super::{OrderStore, OrderStoreError};

/// SQLite cap on bound parameters per statement (older builds).
const MAX_PARAMS: usize = 900;

/// Order store reading `sales_order(system_ref_id, entity_id)`.
pub struct SqliteOrderStore {
    conn: Mutex<Connection>,
}

impl SqliteOrderStore {
    /// Open an existing order database at `path`.
    ///
    /// The file and its schema belong to the order system: a missing file
    /// is an error, and no table is created.
    pub fn new(path: &Path) -> Result<Self, OrderStoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| OrderStoreError::Unavailable(format!("{}: {e}", path.display())))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create (or open) a database at `path` with the order table in place.
    pub fn create(path: &Path) -> Result<Self, OrderStoreError> {
        let conn =
            Connection::open(path).map_err(|e| OrderStoreError::Unavailable(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, OrderStoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| OrderStoreError::Unavailable(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), OrderStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sales_order (
                system_ref_id TEXT PRIMARY KEY,
                entity_id TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| OrderStoreError::Database(e.to_string()))?;

        Ok(())
    }

    /// Insert or replace one mapping.
    pub fn insert(&self, system_ref_id: &str, entity_id: &str) -> Result<(), OrderStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO sales_order (system_ref_id, entity_id) VALUES (?, ?)",
            params![system_ref_id, entity_id],
        )
        .map_err(|e| OrderStoreError::Database(e.to_string()))?;
        Ok(())
    }
}

impl OrderStore for SqliteOrderStore {
    fn ping(&self) -> Result<(), OrderStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM sales_order", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| OrderStoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn find_entity_ids(&self, ids: &[String]) -> Result<HashMap<String, String>, OrderStoreError> {
        let conn = self.conn.lock().unwrap();
        let mut found = HashMap::new();

        for chunk in ids.chunks(MAX_PARAMS) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT system_ref_id, entity_id FROM sales_order WHERE system_ref_id IN ({placeholders})"
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| OrderStoreError::Database(e.to_string()))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| OrderStoreError::Database(e.to_string()))?;

            for row in rows {
                let (ref_id, entity_id) =
                    row.map_err(|e| OrderStoreError::Database(e.to_string()))?;
                found.insert(ref_id, entity_id);
            }
        }

        Ok(found)
    }
}
