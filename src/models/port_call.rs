use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::cargo::Cargo;
use crate::models::vessel::Vessel;
use crate::models::ValidationErrors;

/// A vessel calling at a port: requires the port, the vessel, the provider's
/// reported date, and at least one of eta/arrival/berthed/departure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortCall {
    pub vessel: Vessel,
    pub port_name: String,
    /// Date on which the data was recorded by the provider.
    pub reported_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub berthed: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure: Option<DateTime<Utc>>,
    /// Name of a specific berth in an installation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub berth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation: Option<String>,
    /// Region/zone/port the vessel will call at after this one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cargoes: Vec<Cargo>,
}

impl PortCall {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.port_name.trim().is_empty() {
            errors.push("port_name", "must not be empty");
        }
        if self.eta.is_none()
            && self.arrival.is_none()
            && self.berthed.is_none()
            && self.departure.is_none()
        {
            errors.push(
                "dates",
                "port call must have at least one associated ETA/arrival/berthed/departure",
            );
        }
        if let Err(vessel_errors) = self.vessel.validate() {
            errors.0.extend(vessel_errors.0);
        }
        for cargo in &self.cargoes {
            if let Err(cargo_errors) = cargo.validate() {
                errors.0.extend(cargo_errors.0);
            }
        }
        errors.into_result()
    }
}

/// A port call specialised as a cargo movement event. Identical to
/// [`PortCall`] save for the single `cargo` field; downstream loads the two
/// shapes differently, so they stay distinct kinds on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CargoMovement {
    #[serde(flatten)]
    pub call: PortCall,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cargo: Option<Cargo>,
}

impl CargoMovement {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.call.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(e) => e,
        };
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

    fn base_call() -> PortCall {
        PortCall {
            vessel: Vessel {
                name: Some("OCEAN TRADER".to_string()),
                imo: Some("9232876".to_string()),
                ..Default::default()
            },
            port_name: "Rotterdam".to_string(),
            reported_date: Utc.with_ymd_and_hms(2019, 6, 3, 0, 0, 0).unwrap(),
            eta: None,
            arrival: None,
            berthed: None,
            departure: None,
            berth: None,
            installation: None,
            next_zone: None,
            shipping_agent: None,
            cargoes: Vec::new(),
        }
    }

    #[test]
    fn port_call_requires_one_date() {
        let call = base_call();
        let errors = call.validate().unwrap_err();
        assert!(errors.to_string().contains("at least one"));

        let with_eta = PortCall {
            eta: Some(Utc.with_ymd_and_hms(2019, 6, 5, 14, 0, 0).unwrap()),
            ..base_call()
        };
        assert!(with_eta.validate().is_ok());
    }

    #[test]
    fn cargo_movement_validates_embedded_call() {
        let movement = CargoMovement {
            call: PortCall {
                arrival: Some(Utc.with_ymd_and_hms(2019, 6, 5, 14, 0, 0).unwrap()),
                ..base_call()
            },
            cargo: Some(Cargo {
                product: Some("LNG".to_string()),
                ..Default::default()
            }),
        };
        assert!(movement.validate().is_ok());
    }
}
