use hubspace::DeviceRecord;
use hubspace::StateValue;

use super::MapError;
use super::PlatformHandler;
use super::as_on;
use super::on_off;
use super::switch;
use crate::engine::Command;
use crate::engine::EntityState;
use crate::engine::OutletState;
use crate::engine::Platform;
use crate::engine::PlugState;

const OUTLET_PREFIX: &str = "outlet-";

pub(crate) struct Plug;

/// Declared outlet toggles as (index, instance), ordered by index.
fn outlets(record: &DeviceRecord) -> Vec<(u32, &str)> {
    let mut outlets: Vec<(u32, &str)> = record
        .functions_of("toggle")
        .filter_map(|f| {
            let instance = f.instance.as_deref()?;
            let index = instance.strip_prefix(OUTLET_PREFIX)?.parse().ok()?;
            Some((index, instance))
        })
        .collect();
    outlets.sort_unstable();
    outlets.dedup();
    outlets
}

fn outlet_value(instance: &str, on: bool) -> StateValue {
    StateValue::new("toggle", Some(instance), on_off(on))
}

impl PlatformHandler for Plug {
    fn platform(&self) -> Platform {
        Platform::Plug
    }

    fn map(&self, record: &DeviceRecord) -> EntityState {
        let outlets: Vec<OutletState> = outlets(record)
            .into_iter()
            .map(|(index, instance)| OutletState {
                index,
                on: record
                    .state("toggle", Some(instance))
                    .and_then(as_on)
                    .unwrap_or(false),
            })
            .collect();

        let on = if outlets.is_empty() {
            switch::is_on(record)
        } else {
            outlets.iter().any(|o| o.on)
        };

        EntityState::Plug(PlugState { on, outlets })
    }

    fn command(&self, record: &DeviceRecord, command: &Command) -> Result<Vec<StateValue>, MapError> {
        let outlets = outlets(record);
        match command {
            Command::TurnOn | Command::TurnOff => {
                let on = matches!(command, Command::TurnOn);
                if outlets.is_empty() {
                    Ok(switch::power_values(record, on))
                } else {
                    Ok(outlets
                        .iter()
                        .map(|(_, instance)| outlet_value(instance, on))
                        .collect())
                }
            }
            Command::SetOutlet { index, on } => outlets
                .iter()
                .find(|(i, _)| i == index)
                .map(|(_, instance)| vec![outlet_value(instance, *on)])
                .ok_or_else(|| self.unsupported(command)),
            _ => Err(self.unsupported(command)),
        }
    }
}
