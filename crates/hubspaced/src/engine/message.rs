//! Type-safe message system for hubspaced
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use serde::Deserialize;
use serde::Serialize;

use super::entity::Entity;
use super::state::FanDirection;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// A complete poll succeeded. Replaces every entity the integration owns.
    SnapshotReplaced {
        integration: String,
        entities: Vec<Entity>,
    },

    /// The integration could not reach its devices this cycle
    Unavailable { integration: String, reason: String },

    /// A single entity changed outside a poll, e.g. after a command
    EntityStateChanged { entity: Entity },
}

/// A state change requested by a user or automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(tag = "action", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    TurnOn,
    TurnOff,
    SetBrightness { brightness: u8 },
    SetPercentage { percentage: u8 },
    SetDirection { direction: FanDirection },
    SetColorTemp { kelvin: u32 },
    SetOutlet { index: u32, on: bool },
}

impl Command {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone)]
pub enum ToIntegrationMessage {
    Command { entity_id: String, command: Command },
}
