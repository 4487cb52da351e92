use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::validators::{is_valid_build_year, is_valid_imo};
use crate::models::ValidationErrors;

/// Company classification, synced with the roles downstream understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerRole {
    #[serde(rename = "Builder")]
    Builder,
    #[serde(rename = "Insurer")]
    Insurer,
    #[serde(rename = "ISM Manager")]
    IsmManager,
    #[serde(rename = "Operator")]
    Operator,
    #[serde(rename = "Registered owner")]
    Owner,
    #[serde(rename = "Ship manager/Commercial manager")]
    ShipManager,
}

impl PlayerRole {
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Builder" => Some(Self::Builder),
            "Insurer" => Some(Self::Insurer),
            "ISM Manager" => Some(Self::IsmManager),
            "Operator" => Some(Self::Operator),
            "Registered owner" => Some(Self::Owner),
            "Ship manager/Commercial manager" => Some(Self::ShipManager),
            _ => None,
        }
    }
}

/// Operational status of a vessel as reported by registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VesselStatus {
    #[serde(rename = "Broken Up")]
    BrokenUp,
    #[serde(rename = "Cancelled Order")]
    CancelledOrder,
    #[serde(rename = "Converting/Rebuilding")]
    Converting,
    #[serde(rename = "Continued Existence In Doubt")]
    ExistenceInDoubt,
    #[serde(rename = "In Casualty Or Repairing")]
    InCasualty,
    #[serde(rename = "In Service/Commission")]
    InService,
    #[serde(rename = "Laid-Up")]
    LaidUp,
    #[serde(rename = "Launched")]
    Launched,
    #[serde(rename = "On Order/Under Construction")]
    OnOrder,
    #[serde(rename = "To Be Broken Up")]
    ToBeBrokenUp,
    #[serde(rename = "Total Loss")]
    TotalLoss,
    #[serde(rename = "U.S. Reserve Fleet")]
    UsReserveFleet,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl VesselStatus {
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Broken Up" => Some(Self::BrokenUp),
            "Cancelled Order" => Some(Self::CancelledOrder),
            "Converting/Rebuilding" => Some(Self::Converting),
            "Continued Existence In Doubt" => Some(Self::ExistenceInDoubt),
            "In Casualty Or Repairing" => Some(Self::InCasualty),
            "In Service/Commission" => Some(Self::InService),
            "Laid-Up" => Some(Self::LaidUp),
            "Launched" => Some(Self::Launched),
            "On Order/Under Construction" => Some(Self::OnOrder),
            "To Be Broken Up" => Some(Self::ToBeBrokenUp),
            "Total Loss" => Some(Self::TotalLoss),
            "U.S. Reserve Fleet" => Some(Self::UsReserveFleet),
            "Unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// A company attached to a vessel (owner, manager, insurer, ...).
///
/// Requires at least one of `name` or `imo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Player {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Unique company IMO number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Date on which the player takes control over the associated entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_effect: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<PlayerRole>,
}

impl Player {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.is_none() && self.imo.is_none() {
            errors.push("player", "must have a name or valid IMO number");
        }
        errors.into_result()
    }
}

/// Identifies a vessel attached to an event (port call, charter, AIS
/// message). Registry spiders use [`VesselRegistry`] instead, which
/// describes a vessel exhaustively; events only need identification.
///
/// Requires at least one of `name` or `imo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vessel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imo: Option<String>,
    /// May change throughout a vessel's lifespan, unlike the IMO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mmsi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_weight: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gross_tonnage: Option<u32>,
    /// Length overall, metres.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    /// Width overall, metres.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beam: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vessel_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Vessel {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.is_none() && self.imo.is_none() {
            errors.push("vessel", "must have a name or valid IMO number");
        }
        if let Some(imo) = &self.imo {
            if !is_valid_imo(imo) {
                errors.push("imo", format!("invalid IMO number: {imo}"));
            }
        }
        if let Some(year) = self.build_year {
            if !is_valid_build_year(year) {
                errors.push("build_year", format!("implausible build year: {year}"));
            }
        }
        for (field, value) in [
            ("dead_weight", self.dead_weight),
            ("gross_tonnage", self.gross_tonnage),
            ("length", self.length),
            ("beam", self.beam),
        ] {
            if value == Some(0) {
                errors.push(field, "must be a positive number");
            }
        }
        errors.into_result()
    }
}

/// Survey status row from a registry's classification section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_society: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_change_date: Option<DateTime<Utc>>,
}

/// Survey row certifying the vessel complies with regulatory standards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationSurvey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_society: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_renewal_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_renewal_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,
}

/// Exhaustive vessel description from a registry source. Registry spiders
/// fetch as many properties as they can for updating downstream, so `imo`
/// is mandatory here where event vessels can get by on a name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VesselRegistry {
    pub imo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mmsi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_weight: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gross_tonnage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beam: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vessel_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VesselStatus>,
    /// Raw status string when the source reports one outside the known set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_raw: Option<String>,
    /// Players involved in the management of the vessel.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub companies: Vec<Player>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classification_statuses: Vec<ClassificationStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classification_surveys: Vec<ClassificationSurvey>,
    /// Date on which the info was last updated by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_date: Option<DateTime<Utc>>,
}

impl VesselRegistry {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !is_valid_imo(&self.imo) {
            errors.push("imo", format!("invalid IMO number: {}", self.imo));
        }
        // A deadweight without a type is useless downstream.
        if self.dead_weight.is_some() && self.vessel_type.is_none() {
            errors.push(
                "vessel_type",
                "vessel must have a type if deadweight is supplied",
            );
        }
        if let Some(year) = self.build_year {
            if !is_valid_build_year(year) {
                errors.push("build_year", format!("implausible build year: {year}"));
            }
        }
        for player in &self.companies {
            if let Err(player_errors) = player.validate() {
                errors.0.extend(player_errors.0);
            }
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vessel_needs_name_or_imo() {
        let vessel = Vessel::default();
        assert!(vessel.validate().is_err());

        let named = Vessel {
            name: Some("BERRIZ".to_string()),
            ..Default::default()
        };
        assert!(named.validate().is_ok());
    }

    #[test]
    fn vessel_rejects_bad_imo() {
        let vessel = Vessel {
            imo: Some("12345".to_string()),
            ..Default::default()
        };
        let errors = vessel.validate().unwrap_err();
        assert!(errors.to_string().contains("invalid IMO"));
    }

    #[test]
    fn registry_requires_type_with_deadweight() {
        let registry = VesselRegistry {
            imo: "9232876".to_string(),
            dead_weight: Some(46197),
            ..Default::default()
        };
        let errors = registry.validate().unwrap_err();
        assert!(errors.to_string().contains("deadweight"));

        let typed = VesselRegistry {
            vessel_type: Some("Crude Oil Tanker".to_string()),
            ..registry
        };
        assert!(typed.validate().is_ok());
    }

    #[test]
    fn status_round_trips_the_registry_wording() {
        let status = VesselStatus::from_raw("In Service/Commission").unwrap();
        assert_eq!(status, VesselStatus::InService);
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"In Service/Commission\"");
    }

    #[test]
    fn unknown_player_role_maps_to_none() {
        assert!(PlayerRole::from_raw("Chief Cook").is_none());
        assert_eq!(
            PlayerRole::from_raw("Ship manager/Commercial manager"),
            Some(PlayerRole::ShipManager)
        );
    }
}
