//! Fake device servers for tests.

use std::path::Path;

use axum::Router;
use plantwatch_types::CompleteReading;
use tokio::net::TcpListener;

/// Serve `device` on an ephemeral local port and return its base URL.
pub async fn spawn_device(device: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, device).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base URL with nothing listening behind it.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Rows in the SQLite `readings` table, newest first.
pub fn stored_rows(db_path: &Path) -> Vec<CompleteReading> {
    let conn = rusqlite::Connection::open(db_path).unwrap();
    let mut stmt = conn
        .prepare(
            "SELECT timestamp_utc, temperature, humidity, soil
             FROM readings ORDER BY id DESC",
        )
        .unwrap();
    stmt.query_map([], |row| {
        Ok(CompleteReading {
            timestamp: row.get(0)?,
            temperature: row.get(1)?,
            humidity: row.get(2)?,
            soil: row.get(3)?,
        })
    })
    .unwrap()
    .collect::<Result<Vec<_>, _>>()
    .unwrap()
}
