//! Reading types for the plant watcher.
//!
//! The device reports one sample per request as a flat JSON object:
//!
//! ```json
//! {"timestamp": "2025-06-01T12:00:00Z", "temperature": 21.4, "humidity": 48.0, "soil": 512}
//! ```
//!
//! Any of the measurements may be `null` when a sensor read failed on the
//! device. A [`Reading`] keeps that uncertainty; [`Reading::validate`] turns it
//! into a [`CompleteReading`] that is safe to persist.
//!
//! # Example
//!
//! ```
//! use plantwatch_types::{Field, Reading};
//!
//! let reading: Reading = serde_json::from_str(
//!     r#"{"timestamp": "t0", "temperature": 20.5, "humidity": null, "soil": 300}"#,
//! ).unwrap();
//!
//! let err = reading.validate().unwrap_err();
//! assert_eq!(err.field, Field::Humidity);
//! ```

pub mod error;
pub mod reading;

pub use error::IncompleteReading;
pub use reading::{CompleteReading, Field, Reading};
