use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::config::DbLocation;
use crate::error::{Error, Result};

// ============================================================================
// DATABASE HANDLE
// ============================================================================

/// Process-wide database handle, built once at startup and injected into
/// whoever needs it. Cloning is cheap (shared connection).
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database and make sure the schema exists
    pub fn open(location: &DbLocation) -> anyhow::Result<Self> {
        Ok(Self::from_connection(open_connection(location)?))
    }

    /// Fresh, isolated in-memory database (one per test)
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::open(&DbLocation::Memory)
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run blocking SQL off the async runtime.
    ///
    /// The connection mutex is held for the whole closure, so a transaction
    /// opened inside `f` never interleaves with another request's writes.
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| anyhow!("database connection mutex poisoned"))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| Error::Internal(anyhow::Error::new(e).context("database task failed")))?
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Plain connection with pragmas applied and schema in place (CLI, seeding)
pub fn open_connection(location: &DbLocation) -> anyhow::Result<Connection> {
    let conn = match location {
        DbLocation::File(path) => {
            let conn = Connection::open(path)
                .with_context(|| format!("Failed to open database at {}", path.display()))?;
            // WAL for crash recovery; in-memory databases have no journal file
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(journal_mode = %mode, "journal mode set");
            conn
        }
        DbLocation::Memory => Connection::open_in_memory()?,
    };

    setup_database(&conn)?;
    info!(?location, "database ready");

    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> anyhow::Result<()> {
    // Join rows rely on ON DELETE CASCADE, which SQLite only honours with this on
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_name TEXT NOT NULL
        );

        -- price is kept as decimal TEXT so SQLite never coerces it to REAL
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_name TEXT NOT NULL,
            price TEXT NOT NULL,
            stock INTEGER NOT NULL CHECK (stock >= 0),
            category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL
        );

        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tag_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS product_tags (
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (product_id, tag_id)
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id);
        CREATE INDEX IF NOT EXISTS idx_products_name ON products(product_name);
        CREATE INDEX IF NOT EXISTS idx_product_tags_tag ON product_tags(tag_id);
        CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);",
    )
    .context("Failed to create schema")?;

    Ok(())
}

/// Delete every row (join rows and audit trail included) and restart ids at 1
pub fn clear_all(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "DELETE FROM product_tags;
         DELETE FROM products;
         DELETE FROM tags;
         DELETE FROM categories;
         DELETE FROM events;
         DELETE FROM sqlite_sequence
            WHERE name IN ('categories', 'products', 'tags', 'events');",
    )
}

/// Whether a row with this id exists in `table`
pub(crate) fn row_exists(conn: &Connection, table: &str, id: i64) -> rusqlite::Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", table);
    let found: Option<i64> = conn.query_row(&sql, [id], |row| row.get(0)).optional()?;
    Ok(found.is_some())
}

/// `?1, ?2, ... ?n` for IN (...) lists
pub(crate) fn placeholders(count: usize, offset: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i + offset))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// One recorded change to the catalog (currently: join-row link changes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json =
        serde_json::to_string(&event.data).map_err(|e| Error::Internal(e.into()))?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = memory_conn();
        setup_database(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('categories', 'products', 'tags', 'product_tags', 'events')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let conn = memory_conn();

        let err: Error = conn
            .execute("INSERT INTO product_tags (product_id, tag_id) VALUES (1, 1)", [])
            .unwrap_err()
            .into();

        assert!(matches!(err, Error::Constraint(_)));
    }

    #[test]
    fn test_negative_stock_rejected() {
        let conn = memory_conn();

        let err: Error = conn
            .execute(
                "INSERT INTO products (product_name, price, stock) VALUES ('x', '1.00', -1)",
                [],
            )
            .unwrap_err()
            .into();

        assert!(matches!(err, Error::Constraint(_)));
    }

    #[test]
    fn test_event_log() {
        let conn = memory_conn();

        let event = Event::new(
            "product_tags_linked",
            "product",
            "7",
            serde_json::json!({"tag_ids": [1, 2]}),
            "test_actor",
        );
        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "product", "7").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "product_tags_linked");
        assert_eq!(events[0].actor, "test_actor");
        assert_eq!(events[0].data["tag_ids"][1], 2);
    }

    #[test]
    fn test_clear_all_restarts_ids() {
        let conn = memory_conn();
        conn.execute("INSERT INTO categories (category_name) VALUES ('A')", [])
            .unwrap();
        clear_all(&conn).unwrap();
        conn.execute("INSERT INTO categories (category_name) VALUES ('B')", [])
            .unwrap();

        let id: i64 = conn
            .query_row("SELECT id FROM categories WHERE category_name = 'B'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3, 0), "?1, ?2, ?3");
        assert_eq!(placeholders(2, 1), "?2, ?3");
    }

    #[tokio::test]
    async fn test_call_runs_on_shared_connection() {
        let db = Database::open_in_memory().unwrap();

        db.call(|conn| {
            conn.execute("INSERT INTO tags (tag_name) VALUES ('blue')", [])?;
            Ok(())
        })
        .await
        .unwrap();

        let count: i64 = db
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
