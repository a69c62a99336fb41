//! Reading collector and HTTP gateway for an ESP8266 plant monitor.
//!
//! This crate provides:
//! - A collector that polls the device's sensor endpoint and stores complete
//!   readings in the local database
//! - An authenticated REST gateway that triggers device actions and
//!   on-demand collection
//!
//! # REST API Endpoints
//!
//! - `GET /` - Service info (no auth required)
//! - `GET /read` - Collect and store one reading
//! - `POST /water` - Trigger the watering system
//! - `GET /photo` - Take a photo (base64 in the response)
//! - `POST /restart` - Restart the device
//!
//! All endpoints except `/` require `?api_key=<API_KEY>`.
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/plantwatch/config.toml`
//! (see [`config`]); secrets come from the environment or a `.env` file
//! (see [`secrets`]).

pub mod api;
pub mod collector;
pub mod config;
pub mod device;
pub mod middleware;
pub mod secrets;
pub mod state;

#[cfg(test)]
mod test_support;

pub use collector::{Collector, CollectorError, CycleOutcome, StorageTarget};
pub use config::{
    ApiConfig, Config, ConfigError, DatabaseBackend, DatabaseConfig, EspConfig, LoggingConfig,
    ServiceConfig,
};
pub use device::{Action, DeviceClient, DeviceError, DeviceResponse};
pub use secrets::{ApiKey, DatabaseCredentials, DeviceCredentials, Secrets};
pub use state::AppState;
