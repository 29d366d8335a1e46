#[allow(clippy::module_inception)]
mod engine;
mod entity;
mod integration;
mod message;
pub mod state;

pub use engine::CommandError;
pub use engine::Engine;
pub use entity::DeviceInfo;
pub use entity::Entity;
pub use entity::Platform;
pub use integration::FromIntegrationSender;
pub use integration::Integration;
pub use integration::IntegrationContext;
pub use integration::IntegrationFactoryResult;
pub use integration::REGISTRY as INTEGRATION_REGISTRY;
#[cfg(test)]
pub(crate) use integration::RecordingIntegration;
pub use message::Command;
pub use message::FromIntegrationMessage;
pub use message::ToIntegrationMessage;
pub use state::EntityState;
pub use state::FanDirection;
pub use state::FanState;
pub use state::LightState;
pub use state::OutletState;
pub use state::PlugState;
pub use state::State;
pub use state::SwitchState;
