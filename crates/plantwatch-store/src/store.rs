//! Main store implementation.

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info};

use plantwatch_types::CompleteReading;

use crate::error::{Error, Result};
use crate::schema;

/// SQLite-based store for plant readings.
///
/// The underlying connection is closed when the store is dropped.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Insert a single reading and commit it.
    ///
    /// Returns the row ID of the new reading.
    pub fn insert_reading(&mut self, reading: &CompleteReading) -> Result<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO readings (timestamp_utc, temperature, humidity, soil)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                reading.timestamp,
                reading.temperature,
                reading.humidity,
                reading.soil
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!("Stored reading {}: {}", id, reading);
        Ok(id)
    }
}

/// A reading row as read back by tests.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
struct StoredReading {
    /// Database row ID.
    pub id: i64,
    /// Device-supplied timestamp, as received.
    pub timestamp_utc: String,
    pub temperature: f64,
    pub humidity: f64,
    pub soil: f64,
}

#[cfg(test)]
impl Store {
    fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Count all stored readings.
    fn count_readings(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// The most recently inserted readings, newest first.
    fn recent_readings(&self, limit: u32) -> Result<Vec<StoredReading>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp_utc, temperature, humidity, soil
             FROM readings ORDER BY id DESC LIMIT ?",
        )?;

        let readings = stmt
            .query_map([limit], |row| {
                Ok(StoredReading {
                    id: row.get(0)?,
                    timestamp_utc: row.get(1)?,
                    temperature: row.get(2)?,
                    humidity: row.get(3)?,
                    soil: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }
}
