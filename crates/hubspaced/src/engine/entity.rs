//! Entities as the engine sees them.
//!
//! An entity is the host-side view of one vendor device: a stable id, some
//! descriptive metadata and a typed state. Integrations build them, the
//! engine stores them and the API serves them.

use std::fmt;

use serde::Serialize;

use super::state::EntityState;

/// Kind of entity, which decides the shape of its state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Fan,
    Light,
    Switch,
    Plug,
}

/// Descriptive metadata about the physical device behind an entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DeviceInfo {
    pub device_id: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    /// Vendor device class the entity was mapped from.
    pub device_class: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    /// `<platform>.<vendor id>`, e.g. `fan.8a1e0fa9`
    pub entity_id: String,

    /// Vendor id, stable across polls.
    pub unique_id: String,

    pub name: String,

    /// Name of the integration that owns this entity.
    pub integration: String,

    pub device_info: DeviceInfo,

    /// False while the owning integration cannot reach its devices. The last
    /// known state is kept.
    pub available: bool,

    pub state: EntityState,
}

impl Entity {
    pub fn platform(&self) -> Platform {
        self.state.platform()
    }

    pub fn make_id(platform: Platform, unique_id: &str) -> String {
        format!("{}.{}", platform, unique_id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\" {}", self.entity_id, self.name, self.state)?;
        if !self.available {
            write!(f, " (unavailable)")?;
        }
        Ok(())
    }
}
