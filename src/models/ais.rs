use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::vessel::Vessel;
use crate::models::ValidationErrors;

/// Source from which an AIS signal was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AisType {
    #[serde(rename = "D-AIS")]
    Dynamic,
    #[serde(rename = "S-AIS")]
    Satellite,
    #[serde(rename = "T-AIS")]
    Terrestrial,
}

/// A single position fix inside an AIS message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub ais_type: AisType,
    pub lat: f64,
    pub lon: f64,
    /// Speed over ground the vessel is reporting, in knots.
    pub speed: f64,
    /// Course over ground in degrees.
    pub course: f64,
    /// Time the position was updated, UTC.
    pub received_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draught: Option<f64>,
    /// Raw draught value when the provider's derived figure is unreliable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draught_raw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// AIS navigational status as input by the vessel's crew. May disagree
    /// with the detail page when speed is near zero knots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nav_state: Option<u8>,
}

impl Position {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !(-90.0..=90.0).contains(&self.lat) {
            errors.push("lat", format!("latitude out of range: {}", self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            errors.push("lon", format!("longitude out of range: {}", self.lon));
        }
        if self.speed < 0.0 {
            errors.push("speed", "must not be negative");
        }
        errors.into_result()
    }
}

/// An AIS signal for a vessel, with optional next-destination declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AisMessage {
    pub vessel: Vessel,
    pub position: Position,
    pub ais_type: AisType,
    /// AIS message type, from 1 to 27.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// If unset, the other next-destination fields are ignored downstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_destination_eta: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_destination_ais_type: Option<AisType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_destination_destination: Option<String>,
    pub reported_date: DateTime<Utc>,
}

impl AisMessage {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.position.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(e) => e,
        };
        if let Err(vessel_errors) = self.vessel.validate() {
            errors.0.extend(vessel_errors.0);
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fix() -> Position {
        Position {
            ais_type: AisType::Terrestrial,
            lat: 51.95,
            lon: 4.14,
            speed: 12.4,
            course: 231.0,
            received_time: Utc.with_ymd_and_hms(2019, 8, 14, 6, 30, 0).unwrap(),
            draught: Some(11.2),
            draught_raw: None,
            heading: Some(230.0),
            nav_state: Some(0),
        }
    }

    #[test]
    fn valid_message_passes() {
        let message = AisMessage {
            vessel: Vessel {
                imo: Some("9232876".to_string()),
                mmsi: Some("244690000".to_string()),
                ..Default::default()
            },
            position: fix(),
            ais_type: AisType::Terrestrial,
            message_type: Some("3".to_string()),
            next_destination_eta: None,
            next_destination_ais_type: None,
            next_destination_destination: None,
            reported_date: Utc.with_ymd_and_hms(2019, 8, 14, 6, 31, 0).unwrap(),
        };
        assert!(message.validate().is_ok());
    }

    #[test]
    fn out_of_range_position_fails() {
        let position = Position { lat: 123.0, ..fix() };
        let errors = position.validate().unwrap_err();
        assert!(errors.to_string().contains("latitude"));
    }

    #[test]
    fn ais_type_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&AisType::Satellite).unwrap(),
            "\"S-AIS\""
        );
    }
}
