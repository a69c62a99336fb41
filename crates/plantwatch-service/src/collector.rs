//! Reading collector.
//!
//! A cycle fetches one reading from the device, checks that every value is
//! present and inserts it as a single row. Failures at any step are logged and
//! reported in the returned [`CycleOutcome`]; they never escape as errors, so
//! the standalone loop keeps running and the gateway can report them.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use plantwatch_store::{MySqlTarget, Store};
use plantwatch_types::{CompleteReading, IncompleteReading};

use crate::device::{DeviceClient, DeviceError};

/// Where complete readings are written.
#[derive(Debug, Clone)]
pub enum StorageTarget {
    /// SQLite file, opened per insert on the blocking pool.
    Sqlite(PathBuf),
    /// MySQL server, connected per insert.
    MySql(MySqlTarget),
}

/// Collects readings from the device into the database.
pub struct Collector {
    device: DeviceClient,
    target: StorageTarget,
    /// Serializes cycles started from the loop and from the gateway.
    cycle_lock: Mutex<()>,
}

/// Result of a single collection cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The reading was stored under `id`.
    Stored { id: i64, reading: CompleteReading },
    /// Nothing was stored.
    Skipped(CollectorError),
}

impl CycleOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, CycleOutcome::Stored { .. })
    }
}

/// Collector errors.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to fetch reading: {0}")]
    Fetch(#[from] DeviceError),
    #[error("{0}")]
    Incomplete(#[from] IncompleteReading),
    #[error("Failed to store reading: {0}")]
    Store(#[from] plantwatch_store::Error),
    #[error("Storage task failed: {0}")]
    StoreTask(#[from] tokio::task::JoinError),
}

impl Collector {
    /// Create a collector that writes complete readings to `target`.
    pub fn new(device: DeviceClient, target: StorageTarget) -> Self {
        Self {
            device,
            target,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Run one fetch-validate-insert cycle.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let _guard = self.cycle_lock.lock().await;

        match self.collect().await {
            Ok((id, reading)) => CycleOutcome::Stored { id, reading },
            Err(e) => {
                match &e {
                    CollectorError::Fetch(_) => error!("Error fetching data from device: {}", e),
                    CollectorError::Incomplete(_) => warn!("{}, skipping insertion.", e),
                    CollectorError::Store(_) | CollectorError::StoreTask(_) => {
                        error!("Error inserting data into database: {}", e)
                    }
                }
                CycleOutcome::Skipped(e)
            }
        }
    }

    /// Run cycles forever, sleeping `interval` after each one.
    pub async fn run_forever(&self, interval: Duration) {
        info!(
            "Starting collector for {} (interval: {}s)",
            self.device.endpoint(),
            interval.as_secs()
        );

        loop {
            let outcome = self.run_cycle().await;
            debug!("Cycle finished, stored: {}", outcome.is_stored());
            tokio::time::sleep(interval).await;
        }
    }

    async fn collect(&self) -> Result<(i64, CompleteReading), CollectorError> {
        let reading = self.device.fetch_reading().await?.validate()?;

        // The connection lives only for this insert.
        let id = match &self.target {
            StorageTarget::Sqlite(db_path) => {
                let db_path = db_path.clone();
                let row = reading.clone();
                tokio::task::spawn_blocking(move || {
                    let mut store = Store::open(&db_path)?;
                    store.insert_reading(&row)
                })
                .await??
            }
            StorageTarget::MySql(target) => target.insert_reading(&reading).await?,
        };

        Ok((id, reading))
    }
}
