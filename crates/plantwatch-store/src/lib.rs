//! Local persistence for plant watcher readings.
//!
//! Readings live in a single SQLite table:
//!
//! ```sql
//! readings(id, timestamp_utc, temperature, humidity, soil)
//! ```
//!
//! The collector opens a [`Store`] at the start of each cycle that has a
//! complete reading, inserts one row and drops the store again, so no
//! connection is held between cycles. With the `mysql` feature the same row
//! can go to a MySQL server instead (`MySqlTarget`).
//!
//! # Example
//!
//! ```no_run
//! use plantwatch_store::Store;
//! use plantwatch_types::CompleteReading;
//!
//! let mut store = Store::open(plantwatch_store::default_db_path())?;
//! store.insert_reading(&CompleteReading {
//!     timestamp: "2025-06-01T12:00:00Z".to_string(),
//!     temperature: 21.5,
//!     humidity: 48.0,
//!     soil: 512.0,
//! })?;
//! # Ok::<(), plantwatch_store::Error>(())
//! ```

mod error;
#[cfg(feature = "mysql")]
mod mysql;
mod schema;
mod store;

pub use error::{Error, Result};
#[cfg(feature = "mysql")]
pub use mysql::MySqlTarget;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/plantwatch/readings.db`
/// - macOS: `~/Library/Application Support/plantwatch/readings.db`
/// - Windows: `C:\Users\<user>\AppData\Local\plantwatch\readings.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("plantwatch")
        .join("readings.db")
}
