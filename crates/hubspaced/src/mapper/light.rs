use hubspace::DeviceRecord;
use hubspace::StateValue;
use serde_json::Value;

use super::MapError;
use super::PlatformHandler;
use super::as_level;
use super::as_on;
use super::instance_of;
use super::on_off;
use crate::engine::Command;
use crate::engine::EntityState;
use crate::engine::LightState;
use crate::engine::Platform;

pub(crate) struct Light;

/// Colour temperatures are reported as e.g. `"3700K"`.
fn kelvin(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|k| u32::try_from(k).ok()),
        Value::String(s) => s.trim().trim_end_matches(['K', 'k']).parse().ok(),
        _ => None,
    }
}

impl PlatformHandler for Light {
    fn platform(&self) -> Platform {
        Platform::Light
    }

    fn map(&self, record: &DeviceRecord) -> EntityState {
        let on = record
            .state("power", Some("light-power"))
            .or_else(|| record.first_state("power"))
            .and_then(as_on)
            .unwrap_or(false);

        EntityState::Light(LightState {
            on,
            brightness: record.first_state("brightness").and_then(as_level),
            color_temp_kelvin: record.first_state("color-temperature").and_then(kelvin),
        })
    }

    fn command(&self, record: &DeviceRecord, command: &Command) -> Result<Vec<StateValue>, MapError> {
        let power = |on: bool| StateValue::new("power", instance_of(record, "power"), on_off(on));
        match command {
            Command::TurnOn => Ok(vec![power(true)]),
            Command::TurnOff => Ok(vec![power(false)]),
            Command::SetBrightness { brightness } => Ok(vec![StateValue::new(
                "brightness",
                instance_of(record, "brightness"),
                (*brightness).min(100),
            )]),
            Command::SetColorTemp { kelvin } => Ok(vec![StateValue::new(
                "color-temperature",
                instance_of(record, "color-temperature"),
                format!("{}K", kelvin),
            )]),
            _ => Err(self.unsupported(command)),
        }
    }
}
