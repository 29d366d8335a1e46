pub mod api;
pub mod config;
mod engine;
mod integrations;
pub mod mapper;

pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use engine::Command;
pub use engine::CommandError;
pub use engine::DeviceInfo;
pub use engine::Engine;
pub use engine::Entity;
pub use engine::EntityState;
pub use engine::FanDirection;
pub use engine::FanState;
pub use engine::LightState;
pub use engine::OutletState;
pub use engine::Platform;
pub use engine::PlugState;
pub use engine::State;
pub use engine::SwitchState;
