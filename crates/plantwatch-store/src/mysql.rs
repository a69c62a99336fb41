//! Networked MySQL target.
//!
//! Each insert opens its own connection, creates the `readings` table if it is
//! missing, writes one row inside a transaction and closes the connection.

use std::fmt;

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection;
use tracing::{debug, info, warn};

use plantwatch_types::CompleteReading;

use crate::error::Result;

const CREATE_READINGS: &str = "CREATE TABLE IF NOT EXISTS readings (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    timestamp_utc VARCHAR(64) NOT NULL,
    temperature DOUBLE NOT NULL,
    humidity DOUBLE NOT NULL,
    soil DOUBLE NOT NULL
)";

const INSERT_READING: &str =
    "INSERT INTO readings (timestamp_utc, temperature, humidity, soil) VALUES (?, ?, ?, ?)";

/// Connection settings for a MySQL server holding the `readings` table.
#[derive(Clone)]
pub struct MySqlTarget {
    options: MySqlConnectOptions,
    host: String,
    port: u16,
    database: String,
}

impl fmt::Debug for MySqlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for MySqlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mysql://{}:{}/{}", self.host, self.port, self.database)
    }
}

impl MySqlTarget {
    pub fn new(
        host: &str,
        port: u16,
        database: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Self {
        let mut options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);
        if let Some(user) = user {
            options = options.username(user);
        }
        if let Some(password) = password {
            options = options.password(password);
        }

        Self {
            options,
            host: host.to_string(),
            port,
            database: database.to_string(),
        }
    }

    /// Insert a single reading on a fresh connection.
    ///
    /// Returns the row ID of the new reading.
    pub async fn insert_reading(&self, reading: &CompleteReading) -> Result<i64> {
        debug!("Connecting to {}", self);
        let mut conn = MySqlConnection::connect_with(&self.options).await?;

        let result = insert(&mut conn, reading).await;
        if let Err(e) = conn.close().await {
            warn!("Failed to close connection to {}: {}", self, e);
        }

        let id = result?;
        info!("Stored reading {}: {}", id, reading);
        Ok(id)
    }
}

async fn insert(conn: &mut MySqlConnection, reading: &CompleteReading) -> Result<i64> {
    sqlx::query(CREATE_READINGS).execute(&mut *conn).await?;

    let mut tx = conn.begin().await?;
    let done = sqlx::query(INSERT_READING)
        .bind(reading.timestamp.as_str())
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.soil)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(done.last_insert_id() as i64)
}
