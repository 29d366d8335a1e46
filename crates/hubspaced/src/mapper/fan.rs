use hubspace::DeviceRecord;
use hubspace::StateValue;

use super::MapError;
use super::PlatformHandler;
use super::as_level;
use super::as_on;
use super::instance_of;
use super::on_off;
use crate::engine::Command;
use crate::engine::EntityState;
use crate::engine::FanDirection;
use crate::engine::FanState;
use crate::engine::Platform;

const SPEED_OFF: &str = "fan-speed-000";
const COMFORT_BREEZE: &str = "Comfort Breeze";

pub(crate) struct Fan;

/// Declared speeds, slowest first, without the off setting.
fn speeds(record: &DeviceRecord) -> Vec<&str> {
    record
        .functions_of("fan-speed")
        .next()
        .map(|f| {
            f.values
                .iter()
                .map(String::as_str)
                .filter(|v| *v != SPEED_OFF)
                .collect()
        })
        .unwrap_or_default()
}

fn percentage(speeds: &[&str], current: &str) -> u8 {
    match speeds.iter().position(|s| *s == current) {
        Some(idx) => ((idx + 1) * 100 / speeds.len()) as u8,
        None => 0,
    }
}

/// The slowest speed whose percentage is at least `percentage`.
fn speed_for(speeds: &[&str], percentage: u8) -> Option<usize> {
    if speeds.is_empty() {
        return None;
    }
    let len = speeds.len();
    let idx = (percentage as usize * len).div_ceil(100).clamp(1, len) - 1;
    Some(idx)
}

fn power(record: &DeviceRecord) -> Option<bool> {
    record
        .state("power", Some("fan-power"))
        .or_else(|| record.state("power", None))
        .and_then(as_on)
}

fn power_value(record: &DeviceRecord, on: bool) -> StateValue {
    let instance = if record.function("power", Some("fan-power")).is_some() {
        Some("fan-power")
    } else {
        None
    };
    StateValue::new("power", instance, on_off(on))
}

impl PlatformHandler for Fan {
    fn platform(&self) -> Platform {
        Platform::Fan
    }

    fn map(&self, record: &DeviceRecord) -> EntityState {
        let speeds = speeds(record);
        let running_percentage = record
            .first_state("fan-speed")
            .and_then(|v| v.as_str())
            .map(|current| percentage(&speeds, current))
            .unwrap_or(0);
        let brightness = record.first_state("brightness").and_then(as_level);

        // Fans without a power function are on whenever they spin or their
        // light kit is lit.
        let on = power(record)
            .unwrap_or_else(|| running_percentage > 0 || brightness.is_some_and(|b| b > 0));

        let direction = record
            .first_state("fan-reverse")
            .and_then(|v| v.as_str())
            .and_then(|v| v.parse::<FanDirection>().ok());

        let preset_modes = if record.functions_of("comfort-breeze").next().is_some() {
            vec![COMFORT_BREEZE.to_string()]
        } else {
            vec![]
        };

        EntityState::Fan(FanState {
            on,
            percentage: if on { running_percentage } else { 0 },
            speed_count: speeds.len(),
            direction,
            brightness,
            preset_modes,
        })
    }

    fn command(&self, record: &DeviceRecord, command: &Command) -> Result<Vec<StateValue>, MapError> {
        match command {
            Command::TurnOn => Ok(vec![power_value(record, true)]),
            Command::TurnOff => Ok(vec![power_value(record, false)]),
            Command::SetPercentage { percentage: 0 } => Ok(vec![power_value(record, false)]),
            Command::SetPercentage { percentage } => {
                let speeds = speeds(record);
                let idx = speed_for(&speeds, *percentage).ok_or_else(|| self.unsupported(command))?;
                Ok(vec![
                    power_value(record, true),
                    StateValue::new("fan-speed", instance_of(record, "fan-speed"), speeds[idx]),
                ])
            }
            Command::SetDirection { direction } => Ok(vec![StateValue::new(
                "fan-reverse",
                instance_of(record, "fan-reverse"),
                direction.to_string(),
            )]),
            Command::SetBrightness { brightness } if record.functions_of("brightness").next().is_some() => {
                Ok(vec![StateValue::new(
                    "brightness",
                    instance_of(record, "brightness"),
                    (*brightness).min(100),
                )])
            }
            _ => Err(self.unsupported(command)),
        }
    }
}
