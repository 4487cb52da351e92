use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::cargo::Cargo;
use crate::models::vessel::Vessel;
use crate::models::ValidationErrors;

/// Lifecycle of a spot charter as reported by shipbroker fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpotCharterStatus {
    /// Charter is under negotiation.
    #[serde(rename = "On Subs")]
    OnSubs,
    /// Charter has been agreed upon by both parties.
    #[serde(rename = "Fully Fixed")]
    FullyFixed,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Finished")]
    Finished,
    #[serde(rename = "Cancelled")]
    Cancelled,
    /// Charter was never agreed by both players.
    #[serde(rename = "Failed")]
    Failed,
    /// Charter will happen but for another vessel.
    #[serde(rename = "Replaced")]
    Replaced,
    /// Charter is the same but some data changed.
    #[serde(rename = "Updated")]
    Updated,
}

impl SpotCharterStatus {
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim() {
            "On Subs" => Some(Self::OnSubs),
            "Fully Fixed" => Some(Self::FullyFixed),
            "In Progress" => Some(Self::InProgress),
            "Finished" => Some(Self::Finished),
            "Cancelled" => Some(Self::Cancelled),
            "Failed" => Some(Self::Failed),
            "Replaced" => Some(Self::Replaced),
            "Updated" => Some(Self::Updated),
            _ => None,
        }
    }
}

/// A spot charter fixture: a vessel hired for a single voyage out of a
/// departure zone within a lay-can window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotCharter {
    pub vessel: Vessel,
    /// Name of the loading port.
    pub departure_zone: String,
    /// Names of unloading ports, when known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arrival_zone: Vec<String>,
    /// Window during which the vessel must be at the departure zone.
    pub lay_can_start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lay_can_end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charterer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cargo: Option<Cargo>,
    /// Value of the charter, as reported (e.g. "WS 110", "RNR").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_raw_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SpotCharterStatus>,
    pub reported_date: DateTime<Utc>,
}

impl SpotCharter {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.departure_zone.trim().is_empty() {
            errors.push("departure_zone", "must not be empty");
        }
        if let Some(end) = self.lay_can_end {
            if end < self.lay_can_start {
                errors.push("lay_can_end", "laycan end cannot be before laycan start");
            }
        }
        if let Err(vessel_errors) = self.vessel.validate() {
            errors.0.extend(vessel_errors.0);
        }
        if let Some(cargo) = &self.cargo {
            if let Err(cargo_errors) = cargo.validate() {
                errors.0.extend(cargo_errors.0);
            }
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_charter() -> SpotCharter {
        SpotCharter {
            vessel: Vessel {
                name: Some("SEA PRINCESS".to_string()),
                ..Default::default()
            },
            departure_zone: "Ras Tanura".to_string(),
            arrival_zone: vec!["Singapore".to_string()],
            lay_can_start: Utc.with_ymd_and_hms(2019, 7, 10, 0, 0, 0).unwrap(),
            lay_can_end: Some(Utc.with_ymd_and_hms(2019, 7, 12, 0, 0, 0).unwrap()),
            charterer: Some("Unipec".to_string()),
            seller: None,
            cargo: None,
            rate_value: Some("WS 52.5".to_string()),
            rate_raw_value: None,
            status: Some(SpotCharterStatus::FullyFixed),
            reported_date: Utc.with_ymd_and_hms(2019, 7, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn valid_charter_passes() {
        assert!(base_charter().validate().is_ok());
    }

    #[test]
    fn laycan_end_cannot_precede_start() {
        let charter = SpotCharter {
            lay_can_end: Some(Utc.with_ymd_and_hms(2019, 7, 1, 0, 0, 0).unwrap()),
            ..base_charter()
        };
        let errors = charter.validate().unwrap_err();
        assert!(errors.to_string().contains("laycan"));
    }

    #[test]
    fn status_serializes_with_reported_wording() {
        let json = serde_json::to_string(&SpotCharterStatus::OnSubs).unwrap();
        assert_eq!(json, "\"On Subs\"");
    }
}
