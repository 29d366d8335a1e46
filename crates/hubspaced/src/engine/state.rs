use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::entity::Entity;
use super::entity::Platform;

/// Rotation direction of a fan.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FanDirection {
    Forward,
    Reverse,
}

/// State of a fan entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FanState {
    pub on: bool,

    /// Speed as a share of the fastest setting (0-100).
    pub percentage: u8,

    /// Number of discrete speeds the fan supports, excluding off.
    pub speed_count: usize,

    pub direction: Option<FanDirection>,

    /// Light kit brightness (0-100), if the fan has one.
    pub brightness: Option<u8>,

    pub preset_modes: Vec<String>,
}

/// State of a light entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LightState {
    /// Whether the light is on or off.
    pub on: bool,

    /// Brightness level (0-100), if supported.
    pub brightness: Option<u8>,

    pub color_temp_kelvin: Option<u32>,
}

/// State of a switch entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SwitchState {
    pub on: bool,
}

/// One socket of a multi-outlet plug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletState {
    pub index: u32,
    pub on: bool,
}

/// State of a smart plug. The plug counts as on when any outlet is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlugState {
    pub on: bool,
    pub outlets: Vec<OutletState>,
}

/// Typed state of any entity, tagged with its platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum EntityState {
    Fan(FanState),
    Light(LightState),
    Switch(SwitchState),
    Plug(PlugState),
}

impl EntityState {
    pub fn platform(&self) -> Platform {
        match self {
            EntityState::Fan(_) => Platform::Fan,
            EntityState::Light(_) => Platform::Light,
            EntityState::Switch(_) => Platform::Switch,
            EntityState::Plug(_) => Platform::Plug,
        }
    }

    pub fn is_on(&self) -> bool {
        match self {
            EntityState::Fan(s) => s.on,
            EntityState::Light(s) => s.on,
            EntityState::Switch(s) => s.on,
            EntityState::Plug(s) => s.on,
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", on_off(self.is_on()))?;
        match self {
            EntityState::Fan(s) => {
                write!(f, " {}%", s.percentage)?;
                if s.speed_count > 0 {
                    write!(f, " ({} speeds)", s.speed_count)?;
                }
                if let Some(direction) = s.direction {
                    write!(f, " {}", direction)?;
                }
                if let Some(brightness) = s.brightness {
                    write!(f, " brightness={}", brightness)?;
                }
                if !s.preset_modes.is_empty() {
                    write!(f, " presets=[{}]", s.preset_modes.join(", "))?;
                }
            }
            EntityState::Light(s) => {
                if let Some(brightness) = s.brightness {
                    write!(f, " brightness={}", brightness)?;
                }
                if let Some(kelvin) = s.color_temp_kelvin {
                    write!(f, " {}K", kelvin)?;
                }
            }
            EntityState::Switch(_) => {}
            EntityState::Plug(s) => {
                if !s.outlets.is_empty() {
                    let outlets: Vec<String> = s
                        .outlets
                        .iter()
                        .map(|o| format!("{}:{}", o.index, on_off(o.on)))
                        .collect();
                    write!(f, " outlets=[{}]", outlets.join(", "))?;
                }
            }
        }
        Ok(())
    }
}

/// Centralized snapshot of the entire engine state.
///
/// Entities are keyed by entity id, ordered so listings are stable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub entities: BTreeMap<String, Entity>,
}

impl State {
    pub fn get(&self, entity_id: &str) -> Option<&Entity> {
        self.entities.get(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities owned by one integration.
    pub fn by_integration<'a>(&'a self, integration: &'a str) -> impl Iterator<Item = &'a Entity> {
        self.entities
            .values()
            .filter(move |e| e.integration == integration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_state_serializes_with_platform_tag() {
        let state = EntityState::Fan(FanState {
            on: true,
            percentage: 50,
            speed_count: 4,
            direction: Some(FanDirection::Forward),
            brightness: None,
            preset_modes: vec![],
        });
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["platform"], "fan");
        assert_eq!(json["direction"], "forward");
        assert_eq!(json["percentage"], 50);
    }

    #[test]
    fn test_display() {
        let plug = EntityState::Plug(PlugState {
            on: true,
            outlets: vec![
                OutletState { index: 1, on: true },
                OutletState { index: 2, on: false },
            ],
        });
        insta::assert_snapshot!(plug, @"on outlets=[1:on, 2:off]");

        let light = EntityState::Light(LightState {
            on: false,
            brightness: Some(20),
            color_temp_kelvin: Some(3000),
        });
        insta::assert_snapshot!(light, @"off brightness=20 3000K");
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("reverse".parse::<FanDirection>().unwrap(), FanDirection::Reverse);
        assert!("sideways".parse::<FanDirection>().is_err());
    }
}
