//! Sensor readings as reported by the device.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IncompleteReading;

/// One sample as decoded from the device's JSON body.
///
/// Absent keys decode to `None`, the same as explicit `null`s. Unknown keys
/// are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reading {
    /// Device-supplied timestamp, passed through unparsed.
    pub timestamp: Option<String>,
    /// Air temperature.
    pub temperature: Option<f64>,
    /// Relative humidity.
    pub humidity: Option<f64>,
    /// Soil moisture (raw sensor value).
    pub soil: Option<f64>,
}

impl Reading {
    /// Check that every value is present.
    ///
    /// Fields are checked in [`Field::ALL`] order and the first missing one is
    /// reported.
    pub fn validate(&self) -> Result<CompleteReading, IncompleteReading> {
        let missing = |field| IncompleteReading { field };

        let timestamp = self
            .timestamp
            .clone()
            .ok_or_else(|| missing(Field::Timestamp))?;
        let temperature = self.temperature.ok_or_else(|| missing(Field::Temperature))?;
        let humidity = self.humidity.ok_or_else(|| missing(Field::Humidity))?;
        let soil = self.soil.ok_or_else(|| missing(Field::Soil))?;

        Ok(CompleteReading {
            timestamp,
            temperature,
            humidity,
            soil,
        })
    }
}

/// A reading with every value present, ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteReading {
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
    pub soil: f64,
}

impl fmt::Display for CompleteReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} temperature={} humidity={} soil={}",
            self.timestamp, self.temperature, self.humidity, self.soil
        )
    }
}

/// Names of the values carried by a [`Reading`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Timestamp,
    Temperature,
    Humidity,
    Soil,
}

impl Field {
    /// All fields, in validation order.
    pub const ALL: [Field; 4] = [
        Field::Timestamp,
        Field::Temperature,
        Field::Humidity,
        Field::Soil,
    ];

    /// The JSON key for this field.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Timestamp => "timestamp",
            Field::Temperature => "temperature",
            Field::Humidity => "humidity",
            Field::Soil => "soil",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
