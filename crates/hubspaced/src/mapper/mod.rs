//! Translation between vendor device records and host entities.
//!
//! Each supported device type has a [`PlatformHandler`]. Which handler a
//! record goes to is decided by the vendor's device class through a static
//! table, so adding a device type means adding a row and a handler.
//!
//! Everything here is pure: no I/O, no shared state.

mod fan;
mod light;
mod plug;
mod switch;

use hubspace::DeviceRecord;
use hubspace::StateValue;
use serde_json::Value;

use crate::engine::Command;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::EntityState;
use crate::engine::Platform;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("unknown device class '{0}'")]
    UnknownDeviceClass(String),

    #[error("{platform} entities do not support {command}")]
    UnsupportedCommand {
        platform: Platform,
        command: &'static str,
    },
}

/// Maps one kind of vendor device to one entity platform.
pub(crate) trait PlatformHandler: Sync {
    fn platform(&self) -> Platform;

    /// Build the entity state from a record's reported values.
    fn map(&self, record: &DeviceRecord) -> EntityState;

    /// Vendor state values that carry out `command` on this device.
    fn command(&self, record: &DeviceRecord, command: &Command) -> Result<Vec<StateValue>, MapError>;

    fn unsupported(&self, command: &Command) -> MapError {
        MapError::UnsupportedCommand {
            platform: self.platform(),
            command: command.name(),
        }
    }
}

/// Vendor device class -> handler.
static HANDLERS: &[(&str, &dyn PlatformHandler)] = &[
    ("fan", &fan::Fan),
    ("ceiling-fan", &fan::Fan),
    ("light", &light::Light),
    ("switch", &switch::Switch),
    ("power-outlet", &plug::Plug),
];

fn handler_for(device_class: &str) -> Result<&'static dyn PlatformHandler, MapError> {
    HANDLERS
        .iter()
        .find(|(class, _)| *class == device_class)
        .map(|(_, handler)| *handler)
        .ok_or_else(|| MapError::UnknownDeviceClass(device_class.to_string()))
}

/// Map a record to the state of its entity.
pub fn map(record: &DeviceRecord) -> Result<EntityState, MapError> {
    Ok(handler_for(&record.device_class)?.map(record))
}

/// Map a record to a complete entity owned by `integration`.
pub fn map_entity(integration: &str, record: &DeviceRecord) -> Result<Entity, MapError> {
    let state = map(record)?;
    Ok(Entity {
        entity_id: Entity::make_id(state.platform(), &record.id),
        unique_id: record.id.clone(),
        name: record.name.clone(),
        integration: integration.to_string(),
        device_info: DeviceInfo {
            device_id: record.device_id.clone(),
            manufacturer: record.manufacturer.clone(),
            model: record.model.clone(),
            device_class: record.device_class.clone(),
        },
        available: available(record),
        state,
    })
}

/// Vendor state values that carry out `command` on the device behind `record`.
pub fn command_values(record: &DeviceRecord, command: &Command) -> Result<Vec<StateValue>, MapError> {
    handler_for(&record.device_class)?.command(record, command)
}

/// Devices report connectivity under the `available` class. Absent means
/// reachable.
fn available(record: &DeviceRecord) -> bool {
    record
        .first_state("available")
        .and_then(as_on)
        .unwrap_or(true)
}

/// Read an on/off style value. The vendor uses `"on"`/`"off"` strings for
/// power and toggles and plain booleans elsewhere.
pub(crate) fn as_on(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "on" | "true" => Some(true),
            "off" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Read a 0-100 level, from either a number or a numeric string.
pub(crate) fn as_level(value: &Value) -> Option<u8> {
    let level = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(level.clamp(0.0, 100.0).round() as u8)
}

/// Instance of the first declared function of `class`, if any.
pub(crate) fn instance_of<'a>(record: &'a DeviceRecord, class: &'a str) -> Option<&'a str> {
    record
        .functions_of(class)
        .find_map(|f| f.instance.as_deref())
}

pub(crate) fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}
