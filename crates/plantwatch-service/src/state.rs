//! Application state shared across handlers.

use std::sync::Arc;

use crate::collector::Collector;
use crate::device::DeviceClient;
use crate::secrets::ApiKey;

/// Shared application state.
///
/// Everything here is read-only after startup.
pub struct AppState {
    /// Key every protected request must present.
    pub api_key: ApiKey,
    /// Client used to forward actions to the device.
    pub device: DeviceClient,
    /// Collector used by `/read`.
    pub collector: Collector,
}

impl AppState {
    /// Create new application state.
    pub fn new(api_key: ApiKey, device: DeviceClient, collector: Collector) -> Arc<Self> {
        Arc::new(Self {
            api_key,
            device,
            collector,
        })
    }
}
