//! Secrets read from the environment.
//!
//! | Variable | Used for |
//! |---|---|
//! | `API_KEY` | gateway authentication (`?api_key=...`) |
//! | `ESP_USER`, `ESP_PASSWORD` | HTTP basic auth against the device |
//! | `DB_USER`, `DB_PASSWORD` | login for the `mysql` database backend |
//!
//! `main` loads a `.env` file (via `dotenvy`) before these are read.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

/// Number of random bytes in a generated API key.
const GENERATED_KEY_BYTES: usize = 32;

/// Secrets needed by the collector and gateway.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub api_key: ApiKey,
    pub device: DeviceCredentials,
    pub database: DatabaseCredentials,
}

impl Secrets {
    /// Read secrets from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read secrets through `lookup`, treating empty values as unset.
    ///
    /// When no API key is configured a temporary one is generated and logged.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let api_key = match get("API_KEY") {
            Some(key) => {
                info!("API key loaded from environment");
                ApiKey::new(key)
            }
            None => {
                let key = ApiKey::generate();
                warn!("No API_KEY found in environment, generated a temporary key.");
                warn!("Temporary API Key: {}", key.expose());
                key
            }
        };

        Self {
            api_key,
            device: DeviceCredentials::from_lookup(&lookup),
            database: DatabaseCredentials::from_lookup(&lookup),
        }
    }
}

/// The shared key every protected request must present.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// Generate a random URL-safe key.
    pub fn generate() -> Self {
        let bytes: [u8; GENERATED_KEY_BYTES] = rand::random();
        Self::new(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Exact, constant-time comparison against a key supplied by a caller.
    pub fn matches(&self, provided: &str) -> bool {
        self.0.as_bytes().ct_eq(provided.as_bytes()).into()
    }

    /// The raw key, for display at startup.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Basic-auth credentials for the device.
#[derive(Clone, Default)]
pub struct DeviceCredentials {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl DeviceCredentials {
    /// Read `ESP_USER` and `ESP_PASSWORD` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Self {
            user: get("ESP_USER"),
            password: get("ESP_PASSWORD"),
        }
    }
}

impl fmt::Debug for DeviceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCredentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Login for the `mysql` database backend.
#[derive(Clone, Default)]
pub struct DatabaseCredentials {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl DatabaseCredentials {
    /// Read `DB_USER` and `DB_PASSWORD` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Self {
            user: get("DB_USER"),
            password: get("DB_PASSWORD"),
        }
    }
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}
