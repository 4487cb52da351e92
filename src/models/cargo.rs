use serde::{Deserialize, Serialize};

use crate::models::vessel::Player;
use crate::models::{validators, ValidationErrors};

/// Direction of a cargo movement relative to the vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CargoDirection {
    Load,
    Discharge,
}

impl CargoDirection {
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "load" | "loading" | "export" => Some(Self::Load),
            "discharge" | "discharging" | "import" => Some(Self::Discharge),
            _ => None,
        }
    }
}

/// One cargo movement onto or off a vessel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cargo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement: Option<CargoDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    /// Unit of the volume figure (tons, barrels, cubic meters).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer: Option<Player>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller: Option<Player>,
}

impl Cargo {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(volume) = self.volume {
            if !validators::is_positive(volume) {
                errors.push("volume", "must be a positive number");
            }
        }
        for (field, player) in [("buyer", &self.buyer), ("seller", &self.seller)] {
            if let Some(player) = player {
                if let Err(player_errors) = player.validate() {
                    for message in player_errors.0 {
                        errors.push(field, message);
                    }
                }
            }
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_accepts_synonyms() {
        assert_eq!(CargoDirection::from_raw("Load"), Some(CargoDirection::Load));
        assert_eq!(
            CargoDirection::from_raw("discharging"),
            Some(CargoDirection::Discharge)
        );
        assert_eq!(CargoDirection::from_raw("transit"), None);
    }

    #[test]
    fn non_positive_volume_is_rejected() {
        let mut cargo = Cargo {
            product: Some("Crude Oil".to_string()),
            volume: Some(-4500.0),
            ..Default::default()
        };
        assert!(cargo.validate().is_err());
        cargo.volume = Some(0.0);
        assert!(cargo.validate().is_err());
        cargo.volume = Some(4500.0);
        assert!(cargo.validate().is_ok());
    }
}
