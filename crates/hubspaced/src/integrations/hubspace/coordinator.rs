use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hubspace::DeviceRecord;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::source::DeviceSource;
use crate::engine::Command;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;
use crate::mapper;
use crate::mapper::MapError;

pub const INTEGRATION_NAME: &str = "hubspace";

#[derive(Debug, thiserror::Error)]
enum CommandError {
    #[error("unknown entity {0}")]
    UnknownEntity(String),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Vendor(#[from] hubspace::Error),
}

/// Owns the latest device records and is the only task that talks to the
/// vendor once setup is done. Polls and commands are handled one at a time.
struct Coordinator<S: DeviceSource> {
    source: Arc<S>,
    /// Latest record per entity id, replaced wholesale by each poll
    records: HashMap<String, DeviceRecord>,
    to_engine: FromIntegrationSender,
}

impl<S: DeviceSource> Coordinator<S> {
    fn new(source: Arc<S>, to_engine: FromIntegrationSender) -> Self {
        Self {
            source,
            records: HashMap::new(),
            to_engine,
        }
    }

    async fn run(
        mut self,
        poll_interval: Duration,
        mut commands: mpsc::UnboundedReceiver<(String, Command)>,
    ) {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.poll_once().await,
                cmd = commands.recv() => match cmd {
                    Some((entity_id, command)) => {
                        if let Err(e) = self.handle_command(&entity_id, command).await {
                            warn!("[{}] Command for {} failed: {}", INTEGRATION_NAME, entity_id, e);
                        }
                    }
                    None => break,
                },
            }
        }

        debug!("[{}] Poll loop stopped", INTEGRATION_NAME);
    }

    /// One fetch-and-map cycle.
    ///
    /// Either the engine receives a complete new snapshot or it is told the
    /// integration is unavailable; the previous records are only replaced on
    /// success.
    async fn poll_once(&mut self) {
        let devices = match self.source.fetch_all_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("[{}] Poll failed: {}", INTEGRATION_NAME, e);
                self.send(FromIntegrationMessage::Unavailable {
                    integration: INTEGRATION_NAME.to_string(),
                    reason: e.to_string(),
                })
                .await;
                return;
            }
        };

        let mut records = HashMap::with_capacity(devices.len());
        let mut entities = Vec::with_capacity(devices.len());
        for device in devices {
            match mapper::map_entity(INTEGRATION_NAME, &device) {
                Ok(entity) => {
                    records.insert(entity.entity_id.clone(), device);
                    entities.push(entity);
                }
                Err(e) => {
                    warn!(
                        "[{}] Skipping device {} ({}): {}",
                        INTEGRATION_NAME, device.id, device.name, e
                    );
                }
            }
        }

        debug!("[{}] Poll mapped {} entities", INTEGRATION_NAME, entities.len());
        self.records = records;
        self.send(FromIntegrationMessage::SnapshotReplaced {
            integration: INTEGRATION_NAME.to_string(),
            entities,
        })
        .await;
    }

    /// Push a command to the vendor, then report the expected state without
    /// waiting for the next poll.
    async fn handle_command(&mut self, entity_id: &str, command: Command) -> Result<(), CommandError> {
        let record = self
            .records
            .get(entity_id)
            .ok_or_else(|| CommandError::UnknownEntity(entity_id.to_string()))?;

        let values = mapper::command_values(record, &command)?;
        info!(
            "[{}] {} on {}: {} values",
            INTEGRATION_NAME,
            command.name(),
            entity_id,
            values.len()
        );
        self.source.set_state(&record.id, &values).await?;

        let updated = record.with_values(&values);
        let entity = mapper::map_entity(INTEGRATION_NAME, &updated)?;
        self.records.insert(entity_id.to_string(), updated);
        self.send(FromIntegrationMessage::EntityStateChanged { entity })
            .await;
        Ok(())
    }

    async fn send(&self, msg: FromIntegrationMessage) {
        if let Err(e) = self.to_engine.send(msg).await {
            warn!("[{}] Failed to send message to engine: {}", INTEGRATION_NAME, e);
        }
    }
}

/// HubSpace integration for hubspaced
///
/// Polls the vendor cloud on a fixed interval and forwards commands to it.
pub struct HubspaceIntegration<S: DeviceSource> {
    source: Arc<S>,
    poll_interval: Duration,
    commands: Option<mpsc::UnboundedSender<(String, Command)>>,
    poll_task: Option<JoinHandle<()>>,
}

impl<S: DeviceSource + 'static> HubspaceIntegration<S> {
    pub fn new(source: Arc<S>, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
            commands: None,
            poll_task: None,
        }
    }
}

#[async_trait]
impl<S: DeviceSource + 'static> Integration for HubspaceIntegration<S> {
    fn name(&self) -> &str {
        INTEGRATION_NAME
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        // A failed login isn't fatal: every poll logs in again if needed, and
        // until one succeeds the entities stay unavailable.
        match self.source.authenticate().await {
            Ok(()) => info!("[{}] Logged in", INTEGRATION_NAME),
            Err(e) => warn!(
                "[{}] Initial login failed, will retry on next poll: {}",
                INTEGRATION_NAME, e
            ),
        }

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(self.source.clone(), tx);
        let poll_interval = self.poll_interval;

        info!(
            "[{}] Polling every {}s",
            INTEGRATION_NAME,
            poll_interval.as_secs()
        );
        self.poll_task = Some(tokio::spawn(coordinator.run(poll_interval, commands_rx)));
        self.commands = Some(commands_tx);
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            ToIntegrationMessage::Command { entity_id, command } => {
                let tx = self.commands.as_ref().ok_or_else(|| -> Box<dyn Error + Send> {
                    Box::new(std::io::Error::other("integration is not set up"))
                })?;
                tx.send((entity_id, command))
                    .map_err(|e| -> Box<dyn Error + Send> { Box::new(std::io::Error::other(e.to_string())) })?;
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("[{}] Integration shutting down", INTEGRATION_NAME);
        self.commands = None;
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        Ok(())
    }
}
