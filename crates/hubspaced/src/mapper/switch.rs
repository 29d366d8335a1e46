use hubspace::DeviceRecord;
use hubspace::StateValue;

use super::MapError;
use super::PlatformHandler;
use super::as_on;
use super::instance_of;
use super::on_off;
use crate::engine::Command;
use crate::engine::EntityState;
use crate::engine::Platform;
use crate::engine::SwitchState;

pub(crate) struct Switch;

/// Older switches report `toggle` instead of `power`.
pub(super) fn is_on(record: &DeviceRecord) -> bool {
    record
        .first_state("power")
        .or_else(|| record.first_state("toggle"))
        .and_then(as_on)
        .unwrap_or(false)
}

pub(super) fn power_values(record: &DeviceRecord, on: bool) -> Vec<StateValue> {
    let class = if record.functions_of("power").next().is_none()
        && record.functions_of("toggle").next().is_some()
    {
        "toggle"
    } else {
        "power"
    };
    vec![StateValue::new(class, instance_of(record, class), on_off(on))]
}

impl PlatformHandler for Switch {
    fn platform(&self) -> Platform {
        Platform::Switch
    }

    fn map(&self, record: &DeviceRecord) -> EntityState {
        EntityState::Switch(SwitchState { on: is_on(record) })
    }

    fn command(&self, record: &DeviceRecord, command: &Command) -> Result<Vec<StateValue>, MapError> {
        match command {
            Command::TurnOn => Ok(power_values(record, true)),
            Command::TurnOff => Ok(power_values(record, false)),
            _ => Err(self.unsupported(command)),
        }
    }
}
