use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::ToIntegrationSender;
use super::message::Command;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::state::State;
use crate::engine::IntegrationContext;

/// Why a command could not be queued.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("No integration found for entity: {0}")]
    UnknownEntity(String),

    #[error("Integration '{0}' is not accepting commands")]
    IntegrationGone(String),
}

/// hubspaced engine
///
/// This structure handles the flow of messages between integrations and the
/// outside world, routes commands to the integration owning each entity, and
/// maintains a view of the world with State.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Map of entity_id -> integration name for routing messages
    entity_integration_map: std::sync::Mutex<HashMap<String, String>>,

    /// Communication channels to integrations (for commands)
    integration_channels: std::sync::Mutex<HashMap<String, ToIntegrationSender>>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            entity_integration_map: std::sync::Mutex::new(HashMap::new()),
            integration_channels: std::sync::Mutex::new(HashMap::new()),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register integrations from configuration
    ///
    /// Runs every factory in the registry; each one decides from the config
    /// whether its integration is enabled.
    pub fn register_integrations_from_config(&self, cfg: &crate::config::Config) -> usize {
        let ctx = IntegrationContext { config: cfg };
        let mut registered = 0;
        for constr in super::integration::REGISTRY {
            let integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to setup integration: {:#}", e);
                    continue;
                }
                Ok(None) => continue,
            };
            let name = integration.name().to_string();
            self.register_integration(name, integration);
            registered += 1;
        }
        registered
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.insert(name.clone(), to_integration_tx);
        }

        info!("Registering integration '{}'", name);

        // Spawn integration task
        let handle = tokio::spawn(async move {
            if let Err(e) = integration.setup(from_integration_tx).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                return;
            }

            // Process commands from engine until the engine drops our channel
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
            info!("Integration '{}' stopped", name);
        });

        if let Ok(mut handles) = self.integration_handles.lock() {
            handles.push(handle);
        }
    }

    /// Send a command to the integration that owns `entity_id`
    pub fn send_command(&self, entity_id: &str, command: Command) -> Result<(), CommandError> {
        let integration_name = self
            .entity_integration_map
            .lock()
            .ok()
            .and_then(|map| map.get(entity_id).cloned())
            .ok_or_else(|| CommandError::UnknownEntity(entity_id.to_string()))?;

        let channels = self
            .integration_channels
            .lock()
            .map_err(|_| CommandError::IntegrationGone(integration_name.clone()))?;
        let tx = channels
            .get(&integration_name)
            .ok_or_else(|| CommandError::IntegrationGone(integration_name.clone()))?;

        debug!(
            "Routing {} for {} to '{}'",
            command.name(),
            entity_id,
            integration_name
        );
        tx.send(ToIntegrationMessage::Command {
            entity_id: entity_id.to_string(),
            command,
        })
        .map_err(|_| CommandError::IntegrationGone(integration_name.clone()))
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming messages from integrations and updates state.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send>> {
        info!("Engine starting");

        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            self.handle_event(msg);
        }

        info!("Engine shutting down");
        Ok(())
    }

    /// Stop every integration and wait for their tasks to finish.
    pub async fn shutdown(&self) {
        // Dropping the senders ends each integration's command loop, which
        // then runs its own shutdown.
        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.clear();
        }

        let handles = match self.integration_handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Integration task ended abnormally: {}", e);
            }
        }
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Handle a message from an integration
    pub(crate) fn handle_event(&self, msg: FromIntegrationMessage) {
        match msg {
            FromIntegrationMessage::SnapshotReplaced {
                integration,
                entities,
            } => {
                info!(
                    "[{}] Snapshot replaced: {} entities",
                    integration,
                    entities.len()
                );

                {
                    let mut state = State::clone(&self.state.load());
                    state.entities.retain(|_, e| e.integration != integration);
                    for entity in &entities {
                        state
                            .entities
                            .insert(entity.entity_id.clone(), entity.clone());
                    }
                    self.state.store(Arc::new(state));
                }

                // Record which integration owns each entity for command routing
                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.retain(|_, owner| *owner != integration);
                    for entity in entities {
                        map.insert(entity.entity_id, integration.clone());
                    }
                }
            }
            FromIntegrationMessage::Unavailable {
                integration,
                reason,
            } => {
                warn!(
                    "[{}] Unavailable, keeping last known state: {}",
                    integration, reason
                );

                let mut state = State::clone(&self.state.load());
                for entity in state.entities.values_mut() {
                    if entity.integration == integration {
                        entity.available = false;
                    }
                }
                self.state.store(Arc::new(state));
            }
            FromIntegrationMessage::EntityStateChanged { entity } => {
                info!("Entity state changed: {}", entity);

                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.insert(entity.entity_id.clone(), entity.integration.clone());
                }

                let mut state = State::clone(&self.state.load());
                state.entities.insert(entity.entity_id.clone(), entity);
                self.state.store(Arc::new(state));
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::entity::DeviceInfo;
    use crate::engine::entity::Entity;
    use crate::engine::integration::RecordingIntegration;
    use crate::engine::state::EntityState;
    use crate::engine::state::SwitchState;

    fn switch(id: &str, integration: &str, on: bool) -> Entity {
        Entity {
            entity_id: format!("switch.{}", id),
            unique_id: id.to_string(),
            name: id.to_string(),
            integration: integration.to_string(),
            device_info: DeviceInfo::default(),
            available: true,
            state: EntityState::Switch(SwitchState { on }),
        }
    }

    #[test]
    fn test_snapshot_replaces_only_owning_integration() {
        let engine = Engine::new();
        engine.handle_event(FromIntegrationMessage::SnapshotReplaced {
            integration: "a".to_string(),
            entities: vec![switch("one", "a", true), switch("two", "a", false)],
        });
        engine.handle_event(FromIntegrationMessage::SnapshotReplaced {
            integration: "b".to_string(),
            entities: vec![switch("three", "b", true)],
        });

        // "two" disappeared from the account
        engine.handle_event(FromIntegrationMessage::SnapshotReplaced {
            integration: "a".to_string(),
            entities: vec![switch("one", "a", false)],
        });

        let state = engine.state_snapshot();
        assert_eq!(state.len(), 2);
        assert!(!state.get("switch.one").unwrap().state.is_on());
        assert!(state.get("switch.two").is_none());
        assert!(state.get("switch.three").is_some());

        assert!(matches!(
            engine.send_command("switch.two", Command::TurnOn),
            Err(CommandError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_unavailable_keeps_state() {
        let engine = Engine::new();
        engine.handle_event(FromIntegrationMessage::SnapshotReplaced {
            integration: "a".to_string(),
            entities: vec![switch("one", "a", true)],
        });
        engine.handle_event(FromIntegrationMessage::SnapshotReplaced {
            integration: "b".to_string(),
            entities: vec![switch("two", "b", true)],
        });

        let before = engine.state_snapshot();
        engine.handle_event(FromIntegrationMessage::Unavailable {
            integration: "a".to_string(),
            reason: "timeout".to_string(),
        });

        let state = engine.state_snapshot();
        let one = state.get("switch.one").unwrap();
        assert!(!one.available);
        assert!(one.state.is_on());
        assert!(state.get("switch.two").unwrap().available);

        // readers holding an older snapshot are unaffected
        assert!(before.get("switch.one").unwrap().available);

        engine.handle_event(FromIntegrationMessage::SnapshotReplaced {
            integration: "a".to_string(),
            entities: vec![switch("one", "a", true)],
        });
        assert!(engine.state_snapshot().get("switch.one").unwrap().available);
    }

    #[tokio::test]
    async fn test_command_routed_to_owner() {
        let engine = Engine::new();
        let (integration, mut commands) = RecordingIntegration::new("a");
        engine.register_integration("a".to_string(), Box::new(integration));

        engine.handle_event(FromIntegrationMessage::SnapshotReplaced {
            integration: "a".to_string(),
            entities: vec![switch("one", "a", false)],
        });

        engine.send_command("switch.one", Command::TurnOn).unwrap();

        let ToIntegrationMessage::Command { entity_id, command } = commands.recv().await.unwrap();
        assert_eq!(entity_id, "switch.one");
        assert_eq!(command, Command::TurnOn);

        engine.shutdown().await;
        assert!(matches!(
            engine.send_command("switch.one", Command::TurnOff),
            Err(CommandError::IntegrationGone(_))
        ));
    }

    #[test]
    fn test_state_changed_updates_single_entity() {
        let engine = Engine::new();
        engine.handle_event(FromIntegrationMessage::SnapshotReplaced {
            integration: "a".to_string(),
            entities: vec![switch("one", "a", false), switch("two", "a", false)],
        });
        engine.handle_event(FromIntegrationMessage::EntityStateChanged {
            entity: switch("one", "a", true),
        });

        let state = engine.state_snapshot();
        assert!(state.get("switch.one").unwrap().state.is_on());
        assert!(!state.get("switch.two").unwrap().state.is_on());
    }
}
