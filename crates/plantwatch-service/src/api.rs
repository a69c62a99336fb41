//! HTTP gateway endpoints.
//!
//! | Route | Method | Action |
//! |---|---|---|
//! | `/` | GET | service info (no auth) |
//! | `/read` | GET | run one collector cycle |
//! | `/water` | POST | forward to the device's `water` action |
//! | `/photo` | GET | forward to the device's `photo` action |
//! | `/restart` | POST | forward to the device's `restart` action |
//!
//! Every route also answers `OPTIONS` with an empty 200. Failures of the
//! device or the collector become a 500 with
//! `{"success": false, "error": ..., "timestamp": ...}`; they never reach the
//! client as raw errors.

use std::any::Any;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::collector::{CollectorError, CycleOutcome};
use crate::device::{Action, DeviceError, DeviceResponse};
use crate::middleware::require_api_key;
use crate::state::AppState;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index).options(preflight))
        .route("/read", get(read_sensor).options(preflight))
        .route("/water", post(water_plant).options(preflight))
        .route("/photo", get(take_photo).options(preflight))
        .route("/restart", post(restart_device).options(preflight))
}

/// The complete gateway: routes, authentication, error fallbacks, CORS and tracing.
pub fn app(state: Arc<AppState>) -> Router {
    router()
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(from_fn_with_state(state.api_key.clone(), require_api_key))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AnyOrigin)
}

/// Gateway-local time for response envelopes.
fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Successful action response.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: &'static str,
    /// The device's JSON reply (or `{"message": <text>}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub esp_response: Option<Value>,
    /// Base64 image bytes, for `/photo`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ActionResponse {
    fn new(message: &'static str) -> Self {
        Self {
            success: true,
            message,
            esp_response: None,
            image_data: None,
            content_type: None,
            timestamp: now(),
        }
    }

    fn with_esp_response(mut self, esp_response: Value) -> Self {
        self.esp_response = Some(esp_response);
        self
    }

    fn with_image(mut self, content_type: String, data: &[u8]) -> Self {
        self.image_data = Some(STANDARD.encode(data));
        self.content_type = Some(content_type);
        self
    }
}

/// Failed action response body.
#[derive(Debug, Serialize)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Collector(#[from] CollectorError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = FailureResponse {
            success: false,
            error: self.to_string(),
            timestamp: now(),
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// API information endpoint.
async fn index() -> Json<Value> {
    Json(serde_json::json!({
        "name": "Plant Watcher API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/read": "Fetch sensor data and store in database",
            "/water": "Trigger plant watering system",
            "/photo": "Take a photo of the plant",
            "/restart": "Restart ESP8266 hardware"
        },
        "authentication": "Add ?api_key=YOUR_KEY to all requests",
        "cors": "CORS enabled for cross-origin requests",
        "note": "API key is loaded from the API_KEY environment variable (.env supported)"
    }))
}

/// CORS preflight: empty 200, no business logic.
async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn read_sensor(State(state): State<Arc<AppState>>) -> Result<Json<ActionResponse>, AppError> {
    info!("Reading sensor data via API");

    // The collector has already logged any failure.
    match state.collector.run_cycle().await {
        CycleOutcome::Stored { .. } => Ok(Json(ActionResponse::new(
            "Sensor data read and stored successfully",
        ))),
        CycleOutcome::Skipped(e) => Err(e.into()),
    }
}

async fn water_plant(State(state): State<Arc<AppState>>) -> Result<Json<ActionResponse>, AppError> {
    info!("Triggering plant watering system");

    let esp_response = state
        .device
        .forward_json(Action::Water)
        .await
        .inspect_err(|e| error!("Error triggering watering system: {}", e))?;

    info!("Plant watering triggered successfully");
    Ok(Json(
        ActionResponse::new("Plant watering triggered successfully")
            .with_esp_response(esp_response),
    ))
}

async fn take_photo(State(state): State<Arc<AppState>>) -> Result<Json<ActionResponse>, AppError> {
    info!("Taking plant photo");

    let response = state
        .device
        .forward(Action::Photo)
        .await
        .inspect_err(|e| error!("Error taking photo: {}", e))?;

    let body = match response {
        DeviceResponse::Image { content_type, data } => {
            info!("Photo captured successfully ({} bytes)", data.len());
            ActionResponse::new("Photo captured successfully").with_image(content_type, &data)
        }
        DeviceResponse::Json(value) => {
            info!("Photo request completed");
            ActionResponse::new("Photo request completed").with_esp_response(value)
        }
    };

    Ok(Json(body))
}

async fn restart_device(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ActionResponse>, AppError> {
    info!("Restarting ESP8266 hardware");

    let esp_response = state
        .device
        .forward_json(Action::Restart)
        .await
        .inspect_err(|e| error!("Error restarting hardware: {}", e))?;

    info!("ESP8266 restart command sent successfully");
    Ok(Json(
        ActionResponse::new("ESP8266 restart command sent successfully")
            .with_esp_response(esp_response),
    ))
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Not Found",
            "message": "Endpoint not found. Check / for available endpoints."
        })),
    )
}

async fn method_not_allowed() -> (StatusCode, Json<Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({
            "error": "Method Not Allowed",
            "message": "Method not allowed for this endpoint. Check / for available endpoints."
        })),
    )
}

/// Last-resort handler for panics inside request handling.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Unhandled error while serving request: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": "Internal Server Error",
            "message": "An unexpected error occurred."
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, header},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::collector::{Collector, StorageTarget};
    use crate::device::DeviceClient;
    use crate::secrets::{ApiKey, DeviceCredentials};
    use crate::test_support::{spawn_device, stored_rows, unreachable_url};

    const KEY: &str = "test-key";

    fn create_test_state(device_base: &str, db_path: &Path) -> Arc<AppState> {
        let device = DeviceClient::new(
            &format!("{}/read", device_base),
            Duration::from_secs(2),
            DeviceCredentials::default(),
        )
        .unwrap();
        let collector = Collector::new(
            device.clone(),
            StorageTarget::Sqlite(db_path.to_path_buf()),
        );
        AppState::new(ApiKey::new(KEY), device, collector)
    }

    /// State pointing at an address with nothing listening.
    async fn offline_state() -> (Arc<AppState>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let state = create_test_state(
            &unreachable_url().await,
            &temp_dir.path().join("readings.db"),
        );
        (state, temp_dir)
    }

    async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn with_key(path: &str) -> String {
        format!("{}?api_key={}", path, KEY)
    }

    fn assert_failure(json: &Value) {
        assert_eq!(json["success"], false);
        assert!(!json["error"].as_str().unwrap().is_empty());
        assert!(json["timestamp"].is_string());
        assert!(json.get("esp_response").is_none());
        assert!(json.get("image_data").is_none());
    }

    #[tokio::test]
    async fn test_index_needs_no_key() {
        let (state, _dir) = offline_state().await;
        let (status, json) = send(app(state), Method::GET, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "Plant Watcher API");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        let endpoints = json["endpoints"].as_object().unwrap();
        for path in ["/read", "/water", "/photo", "/restart"] {
            assert!(endpoints.contains_key(path));
        }
        assert!(json["authentication"].as_str().unwrap().contains("api_key"));
    }

    #[tokio::test]
    async fn test_protected_routes_require_key() {
        let (state, _dir) = offline_state().await;
        let routes = [
            (Method::GET, "/read"),
            (Method::POST, "/water"),
            (Method::GET, "/photo"),
            (Method::POST, "/restart"),
        ];

        for (method, path) in routes {
            let (status, json) = send(app(state.clone()), method.clone(), path).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", path);
            assert_eq!(json["error"], "Unauthorized");

            let wrong = format!("{}?api_key=nope", path);
            let (status, _) = send(app(state.clone()), method, &wrong).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", path);
        }
    }

    #[tokio::test]
    async fn test_options_returns_empty_ok_without_touching_device() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counting = {
            let hits = hits.clone();
            move || {
                hits.fetch_add(1, Ordering::SeqCst);
                async { "{}" }
            }
        };
        let device = Router::new()
            .route("/read", get(counting.clone()))
            .route("/water", post(counting.clone()))
            .route("/photo", get(counting.clone()))
            .route("/restart", post(counting));
        let base = spawn_device(device).await;
        let temp_dir = tempfile::tempdir().unwrap();
        let state = create_test_state(&base, &temp_dir.path().join("readings.db"));

        for path in ["/", "/read", "/water", "/photo", "/restart"] {
            let (status, json) = send(app(state.clone()), Method::OPTIONS, path).await;
            assert_eq!(status, StatusCode::OK, "{}", path);
            assert_eq!(json, Value::Null, "{}", path);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let (state, _dir) = offline_state().await;
        let response = app(state)
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/water")
                    .header(header::ORIGIN, "http://grafana.local")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (state, _dir) = offline_state().await;
        let (status, json) = send(app(state), Method::GET, &with_key("/nonexistent")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Not Found");
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn test_wrong_method_is_not_allowed() {
        let (state, _dir) = offline_state().await;
        let (status, json) = send(app(state.clone()), Method::GET, &with_key("/water")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json["error"], "Method Not Allowed");

        let (status, _) = send(app(state), Method::POST, &with_key("/read")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_photo_image_is_base64_encoded() {
        let image: Vec<u8> = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        let served = image.clone();
        let device = Router::new().route(
            "/photo",
            get(move || async move { ([(header::CONTENT_TYPE, "image/jpeg")], served) }),
        );
        let base = spawn_device(device).await;
        let temp_dir = tempfile::tempdir().unwrap();
        let state = create_test_state(&base, &temp_dir.path().join("readings.db"));

        let (status, json) = send(app(state), Method::GET, &with_key("/photo")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Photo captured successfully");
        assert_eq!(json["content_type"], "image/jpeg");
        let decoded = STANDARD
            .decode(json["image_data"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, image);
        assert!(json.get("esp_response").is_none());
    }

    #[tokio::test]
    async fn test_photo_json_is_relayed() {
        let device = Router::new().route(
            "/photo",
            get(|| async { Json(serde_json::json!({"status": "camera busy", "retry": 5})) }),
        );
        let base = spawn_device(device).await;
        let temp_dir = tempfile::tempdir().unwrap();
        let state = create_test_state(&base, &temp_dir.path().join("readings.db"));

        let (status, json) = send(app(state), Method::GET, &with_key("/photo")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Photo request completed");
        assert_eq!(
            json["esp_response"],
            serde_json::json!({"status": "camera busy", "retry": 5})
        );
        assert!(json.get("image_data").is_none());
    }

    #[tokio::test]
    async fn test_water_and_restart_relay_device_response() {
        let device = Router::new()
            .route("/water", post(|| async { Json(serde_json::json!({"pump": "on"})) }))
            .route("/restart", post(|| async { "Restarting..." }));
        let base = spawn_device(device).await;
        let temp_dir = tempfile::tempdir().unwrap();
        let state = create_test_state(&base, &temp_dir.path().join("readings.db"));

        let (status, json) = send(app(state.clone()), Method::POST, &with_key("/water")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Plant watering triggered successfully");
        assert_eq!(json["esp_response"], serde_json::json!({"pump": "on"}));
        assert!(json["timestamp"].is_string());

        let (status, json) = send(app(state), Method::POST, &with_key("/restart")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "ESP8266 restart command sent successfully");
        assert_eq!(
            json["esp_response"],
            serde_json::json!({"message": "Restarting..."})
        );
    }

    #[tokio::test]
    async fn test_unreachable_device_returns_failure_body() {
        let (state, _dir) = offline_state().await;
        let routes = [
            (Method::POST, "/water"),
            (Method::POST, "/restart"),
            (Method::GET, "/photo"),
        ];

        for (method, path) in routes {
            let (status, json) = send(app(state.clone()), method, &with_key(path)).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", path);
            assert_failure(&json);
        }
    }

    #[tokio::test]
    async fn test_device_error_status_returns_failure_body() {
        let device = Router::new().route(
            "/water",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "pump fault") }),
        );
        let base = spawn_device(device).await;
        let temp_dir = tempfile::tempdir().unwrap();
        let state = create_test_state(&base, &temp_dir.path().join("readings.db"));

        let (status, json) = send(app(state), Method::POST, &with_key("/water")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_failure(&json);
        assert!(json["error"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_read_stores_reading() {
        let device = Router::new().route(
            "/read",
            get(|| async {
                Json(serde_json::json!({
                    "timestamp": "2025-06-01T12:00:00Z",
                    "temperature": 19.5,
                    "humidity": 62.0,
                    "soil": 701
                }))
            }),
        );
        let base = spawn_device(device).await;
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path: PathBuf = temp_dir.path().join("readings.db");
        let state = create_test_state(&base, &db_path);

        let (status, json) = send(app(state), Method::GET, &with_key("/read")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Sensor data read and stored successfully");

        assert_eq!(stored_rows(&db_path).len(), 1);
    }

    #[tokio::test]
    async fn test_read_incomplete_reading_reports_failure() {
        let device = Router::new().route(
            "/read",
            get(|| async {
                Json(serde_json::json!({
                    "timestamp": "2025-06-01T12:00:00Z",
                    "temperature": 19.5,
                    "humidity": 62.0,
                    "soil": null
                }))
            }),
        );
        let base = spawn_device(device).await;
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("readings.db");
        let state = create_test_state(&base, &db_path);

        let (status, json) = send(app(state), Method::GET, &with_key("/read")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_failure(&json);
        assert_eq!(json["error"], "Missing value for soil");
        assert!(!db_path.exists());
    }

    #[tokio::test]
    async fn test_read_unreachable_device_reports_failure() {
        let (state, _dir) = offline_state().await;
        let (status, json) = send(app(state), Method::GET, &with_key("/read")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_failure(&json);
        assert!(
            json["error"]
                .as_str()
                .unwrap()
                .starts_with("Failed to fetch reading")
        );
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_server_error() {
        async fn explode() -> &'static str {
            panic!("boom")
        }
        let app = Router::new()
            .route("/explode", get(explode))
            .layer(CatchPanicLayer::custom(panic_response));

        let (status, json) = send(app, Method::GET, "/explode").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Internal Server Error");
        assert_eq!(json["message"], "An unexpected error occurred.");
    }

    #[test]
    fn test_app_error_is_internal_server_error() {
        let error = AppError::Collector(CollectorError::Incomplete(
            plantwatch_types::IncompleteReading {
                field: plantwatch_types::Field::Humidity,
            },
        ));
        assert_eq!(error.to_string(), "Missing value for humidity");
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_action_response_omits_empty_fields() {
        let json = serde_json::to_value(ActionResponse::new("done")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "done");
        assert!(json.get("esp_response").is_none());
        assert!(json.get("image_data").is_none());
        assert!(json.get("content_type").is_none());
        assert!(json["timestamp"].is_string());
    }
}
