//! HTTP client for the ESP8266 device.
//!
//! The device serves its current reading at the configured endpoint (usually
//! `http://<device>/read`) and accepts actions at sibling paths:
//!
//! | Action | Method | Path |
//! |---|---|---|
//! | water | POST | `/water` |
//! | photo | GET | `/photo` |
//! | restart | POST | `/restart` |
//!
//! Every request carries the device's basic-auth credentials and is bounded by
//! the configured timeout. There are no retries.

use std::fmt;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use plantwatch_types::Reading;

use crate::secrets::DeviceCredentials;

/// Error type for device requests.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The request could not be sent or timed out.
    #[error("Device not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The device answered with a non-2xx status.
    #[error("Device returned {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The response body could not be read or decoded.
    #[error("Invalid response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Actions the gateway can forward to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Water,
    Photo,
    Restart,
}

impl Action {
    /// Path segment on the device.
    pub fn path(self) -> &'static str {
        match self {
            Action::Water => "water",
            Action::Photo => "photo",
            Action::Restart => "restart",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Action::Photo => Method::GET,
            Action::Water | Action::Restart => Method::POST,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A successful device response.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceResponse {
    /// JSON body, or `{"message": <text>}` when the body is not JSON.
    Json(Value),
    /// Binary image payload.
    Image { content_type: String, data: Vec<u8> },
}

impl DeviceResponse {
    /// Classify a response body by its content type.
    ///
    /// Any content type mentioning `image` is treated as binary.
    pub fn from_body(content_type: Option<&str>, body: Vec<u8>) -> Self {
        match content_type {
            Some(ct) if ct.contains("image") => DeviceResponse::Image {
                content_type: ct.to_string(),
                data: body,
            },
            _ => DeviceResponse::Json(json_or_message(&body)),
        }
    }
}

/// Parse `body` as JSON, falling back to `{"message": <text>}`.
pub fn json_or_message(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|_| {
        serde_json::json!({ "message": String::from_utf8_lossy(body) })
    })
}

/// Strip the last path segment from the reading endpoint.
///
/// `http://192.168.1.100/read` becomes `http://192.168.1.100`.
pub fn device_base_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    let authority_start = trimmed.find("://").map(|i| i + 3).unwrap_or(0);

    match trimmed[authority_start..].rfind('/') {
        Some(i) => trimmed[..authority_start + i].to_string(),
        None => trimmed.to_string(),
    }
}

/// HTTP client for the device.
#[derive(Clone)]
pub struct DeviceClient {
    client: Client,
    endpoint: String,
    base_url: String,
    credentials: DeviceCredentials,
}

impl fmt::Debug for DeviceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceClient")
            .field("endpoint", &self.endpoint)
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl DeviceClient {
    /// Create a client for the device whose reading lives at `endpoint`.
    pub fn new(endpoint: &str, timeout: Duration, credentials: DeviceCredentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DeviceError::Client)?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            base_url: device_base_url(endpoint),
            credentials,
        })
    }

    /// The reading endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The device root that action paths are appended to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn action_url(&self, action: Action) -> String {
        format!("{}/{}", self.base_url, action.path())
    }

    /// Fetch the current reading.
    pub async fn fetch_reading(&self) -> Result<Reading> {
        let url = self.endpoint.clone();
        let response = self.send(Method::GET, &url).await?;

        response
            .json::<Reading>()
            .await
            .map_err(|source| DeviceError::Body { url, source })
    }

    /// Forward `action` and classify the response by content type.
    pub async fn forward(&self, action: Action) -> Result<DeviceResponse> {
        let (content_type, body) = self.forward_raw(action).await?;
        Ok(DeviceResponse::from_body(content_type.as_deref(), body))
    }

    /// Forward `action` and decode the response as JSON (or a text message).
    pub async fn forward_json(&self, action: Action) -> Result<Value> {
        let (_, body) = self.forward_raw(action).await?;
        Ok(json_or_message(&body))
    }

    async fn forward_raw(&self, action: Action) -> Result<(Option<String>, Vec<u8>)> {
        let url = self.action_url(action);
        let response = self
            .send(action.method(), &url)
            .await
            .inspect_err(|e| debug!("Device request failed for {}: {}", action, e))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response
            .bytes()
            .await
            .map_err(|source| DeviceError::Body {
                url: url.clone(),
                source,
            })?;

        debug!(
            "Device answered {} with {} bytes ({})",
            action,
            body.len(),
            content_type.as_deref().unwrap_or("no content type")
        );
        Ok((content_type, body.to_vec()))
    }

    /// Send an authenticated request and reject non-2xx responses.
    async fn send(&self, method: Method, url: &str) -> Result<reqwest::Response> {
        let response = self
            .authorize(self.client.request(method, url))
            .send()
            .await
            .map_err(|source| DeviceError::NotReachable {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(DeviceError::Status {
                url: url.to_string(),
                status,
            })
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials.user {
            Some(user) => request.basic_auth(user, self.credentials.password.as_deref()),
            None => request,
        }
    }
}
