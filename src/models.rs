//! Data models for weather station readings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// Map position of a station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    // ---
    pub lat: f64,
    pub lng: f64,
}

/// Optional measurement scalars. `None` means "not measured by this station".
///
/// `precipitation` is incremental: rainfall since the station's previous
/// reading, never a running total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurements {
    // ---
    #[serde(default, alias = "temp", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(default, alias = "hum", skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,

    #[serde(default, alias = "prec", skip_serializing_if = "Option::is_none")]
    pub precipitation: Option<f64>,

    #[serde(default, alias = "wind", skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<f64>,
}

impl Measurements {
    /// Field name and value for every scalar, in declaration order.
    pub fn fields(&self) -> [(&'static str, Option<f64>); 7] {
        // ---
        [
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("precipitation", self.precipitation),
            ("windSpeed", self.wind_speed),
            ("windDirection", self.wind_direction),
            ("pressure", self.pressure),
            ("batteryVoltage", self.battery_voltage),
        ]
    }
}

/// Ingest request body as sent by a station. Nothing is trusted yet.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPayload {
    // ---
    pub station_id: Option<String>,
    pub location: Option<String>,
    pub coordinates: Option<Coordinates>,

    /// When the station took the sample; the server clock is used if absent.
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub measurements: Measurements,
}

/// A stored, immutable telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    // ---
    pub id: Uuid,
    pub station_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,

    #[serde(flatten)]
    pub measurements: Measurements,
}

/// Acknowledgment returned to a station after a successful ingest.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestAck {
    // ---
    pub status: &'static str,
    pub id: Uuid,
    pub station_id: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Reading> for IngestAck {
    fn from(reading: &Reading) -> Self {
        IngestAck {
            status: "success",
            id: reading.id,
            station_id: reading.station_id.clone(),
            timestamp: reading.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_payload_accepts_camel_case_fields() {
        // ---
        let payload: ReadingPayload = serde_json::from_str(
            r#"{
                "stationId": "S1",
                "location": "Los Juncares",
                "coordinates": {"lat": 41.64, "lng": -0.88},
                "timestamp": "2025-03-26T08:00:00Z",
                "temperature": 10.5,
                "windSpeed": 3.2,
                "batteryVoltage": 3.7
            }"#,
        )
        .unwrap();

        assert_eq!(payload.station_id.as_deref(), Some("S1"));
        assert_eq!(
            payload.timestamp,
            Some(Utc.with_ymd_and_hms(2025, 3, 26, 8, 0, 0).unwrap())
        );
        assert_eq!(payload.measurements.temperature, Some(10.5));
        assert_eq!(payload.measurements.wind_speed, Some(3.2));
        assert_eq!(payload.measurements.battery_voltage, Some(3.7));
        assert_eq!(payload.measurements.humidity, None);
    }

    #[test]
    fn test_payload_accepts_legacy_short_names() {
        // ---
        let payload: ReadingPayload = serde_json::from_str(
            r#"{"stationId": "local", "temp": 21.0, "hum": 40, "prec": 0.2, "wind": 5}"#,
        )
        .unwrap();

        assert_eq!(payload.measurements.temperature, Some(21.0));
        assert_eq!(payload.measurements.humidity, Some(40.0));
        assert_eq!(payload.measurements.precipitation, Some(0.2));
        assert_eq!(payload.measurements.wind_speed, Some(5.0));
        assert!(payload.timestamp.is_none());
    }

    #[test]
    fn test_reading_omits_unmeasured_fields() {
        // ---
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let reading = Reading {
            id: Uuid::nil(),
            station_id: "S1".to_string(),
            location: None,
            coordinates: None,
            timestamp: ts,
            received_at: ts,
            measurements: Measurements {
                temperature: Some(20.0),
                ..Default::default()
            },
        };

        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["stationId"], "S1");
        assert_eq!(json["temperature"], 20.0);
        assert!(json.get("humidity").is_none());
        assert!(json.get("coordinates").is_none());
        assert!(json.get("receivedAt").is_some());
    }
}
