pub mod ais;
pub mod cargo;
pub mod port_call;
pub mod spot_charter;
pub mod validators;
pub mod vessel;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use ais::{AisMessage, AisType, Position};
pub use cargo::{Cargo, CargoDirection};
pub use port_call::{CargoMovement, PortCall};
pub use spot_charter::{SpotCharter, SpotCharterStatus};
pub use vessel::{
    ClassificationStatus, ClassificationSurvey, Player, PlayerRole, Vessel, VesselRegistry,
    VesselStatus,
};

/// Metadata envelope attached to every emitted record: identity tracking
/// across the stack, plus enough provenance to tie a record back to the
/// spider run that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemMeta {
    pub uuid: Uuid,
    /// Bumped with every change in the repo (crate semantic version).
    pub package_version: String,
    /// Data source provider code, as understood downstream.
    pub provider_name: String,
    pub spider_name: String,
    pub job_time: DateTime<Utc>,
    pub item_time: DateTime<Utc>,
}

impl ItemMeta {
    pub fn new(provider_name: &str, spider_name: &str, job_time: DateTime<Utc>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            package_version: env!("CARGO_PKG_VERSION").to_string(),
            provider_name: provider_name.to_string(),
            spider_name: spider_name.to_string(),
            job_time,
            item_time: Utc::now(),
        }
    }
}

/// One fact extracted from a source: a port call, a charter fixture, a
/// vessel's AIS position, a registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Item {
    Vessel(Vessel),
    VesselRegistry(VesselRegistry),
    PortCall(PortCall),
    CargoMovement(CargoMovement),
    SpotCharter(SpotCharter),
    AisMessage(AisMessage),
}

impl Item {
    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        match self {
            Item::Vessel(v) => v.validate(),
            Item::VesselRegistry(v) => v.validate(),
            Item::PortCall(p) => p.validate(),
            Item::CargoMovement(c) => c.validate(),
            Item::SpotCharter(s) => s.validate(),
            Item::AisMessage(a) => a.validate(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Item::Vessel(_) => "vessel",
            Item::VesselRegistry(_) => "vessel_registry",
            Item::PortCall(_) => "port_call",
            Item::CargoMovement(_) => "cargo_movement",
            Item::SpotCharter(_) => "spot_charter",
            Item::AisMessage(_) => "ais_message",
        }
    }
}

/// A validated record ready for the sink: metadata envelope flattened
/// alongside the typed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub meta: ItemMeta,
    #[serde(flatten)]
    pub item: Item,
}

/// Field-level failures collected during model validation. A model reports
/// everything wrong with it at once rather than bailing on the first error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(format!("{}: {}", field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> std::result::Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_with_flattened_meta_and_kind_tag() {
        let meta = ItemMeta::new("Equasis", "equasis", Utc::now());
        let record = Record {
            meta,
            item: Item::Vessel(Vessel {
                name: Some("OCEAN TRADER".to_string()),
                imo: Some("9232876".to_string()),
                ..Default::default()
            }),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["kind"], "vessel");
        assert_eq!(value["provider_name"], "Equasis");
        assert_eq!(value["name"], "OCEAN TRADER");
        assert!(value["uuid"].is_string());
        assert_eq!(value["package_version"], env!("CARGO_PKG_VERSION"));
    }
}
