use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::{
    catalog::AssayDefinition,
    core::store::{AssayStatus, AssayStatusView},
    engine::{
        aggregator::{AggregationEngine, EngineError},
        delta::{EngineStats, StatusDelta},
    },
    record::SupplyRecord,
    registry::{Device, DeviceRegistry},
    types::{AssayCode, DeviceSn},
};

use super::events::StatusEvent;

/// Failure seen by a [`StatusEngineHandle`] caller.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The engine rejected the command.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The engine task has stopped.
    #[error("status engine channel closed")]
    ChannelClosed,
}

/// Channel sizing for [`spawn_status_engine`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Commands buffered before senders wait.
    pub command_queue_bound: usize,
    /// Events kept for slow subscribers before they lag.
    pub event_queue_bound: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_queue_bound: 1024,
        }
    }
}

/// Cloneable front end to the engine task.
#[derive(Clone)]
pub struct StatusEngineHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<StatusEvent>,
}

enum Command {
    LoadCatalogue {
        definitions: Vec<AssayDefinition>,
        resp: oneshot::Sender<Result<usize, RuntimeError>>,
    },
    InitStatus {
        definition: AssayDefinition,
        resp: oneshot::Sender<Result<Vec<AssayCode>, RuntimeError>>,
    },
    Rebuild {
        code: AssayCode,
        resp: oneshot::Sender<Result<Vec<AssayCode>, RuntimeError>>,
    },
    Update {
        record: SupplyRecord,
        resp: oneshot::Sender<Vec<AssayCode>>,
    },
    Unload {
        record: SupplyRecord,
        resp: oneshot::Sender<Vec<AssayCode>>,
    },
    ApplyDevice {
        device: Device,
        resp: oneshot::Sender<Vec<AssayCode>>,
    },
    RemoveDevice {
        sn: DeviceSn,
        resp: oneshot::Sender<Vec<AssayCode>>,
    },
    RefreshMasks {
        resp: oneshot::Sender<Vec<AssayCode>>,
    },
    Get {
        code: AssayCode,
        resp: oneshot::Sender<Option<AssayStatusView>>,
    },
    Snapshot {
        resp: oneshot::Sender<Vec<AssayStatusView>>,
    },
    Stats {
        resp: oneshot::Sender<EngineStats>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Moves `engine` onto its own task and returns the handle feeding it.
///
/// The task is the only writer of the status store; commands are handled
/// one at a time in arrival order.
pub fn spawn_status_engine<R>(engine: AggregationEngine<R>, config: RuntimeConfig) -> StatusEngineHandle
where
    R: DeviceRegistry + 'static,
{
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound);
    let (events_tx, _) = broadcast::channel::<StatusEvent>(config.event_queue_bound);

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut engine = engine;

        while let Some(cmd) = cmd_rx.recv().await {
            if handle_command(cmd, &mut engine, &events_tx_loop) {
                break;
            }
        }
        info!("status engine stopped");
    });

    StatusEngineHandle { cmd_tx, events_tx }
}

impl StatusEngineHandle {
    /// New receiver for status events sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events_tx.subscribe()
    }

    /// Clears the store and rebuilds a status per definition.
    pub async fn load_catalogue(&self, definitions: Vec<AssayDefinition>) -> Result<usize, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::LoadCatalogue { definitions, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Builds the status for one definition, replacing any existing one.
    pub async fn init_status(&self, definition: AssayDefinition) -> Result<Vec<AssayCode>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::InitStatus { definition, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Full rebuild of an existing status from a fresh fetch.
    pub async fn rebuild(&self, code: AssayCode) -> Result<Vec<AssayCode>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Rebuild { code, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Applies an added or changed record; returns the codes that changed.
    pub async fn update(&self, record: SupplyRecord) -> Result<Vec<AssayCode>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Update { record, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Removes a record; returns every code it was removed from.
    pub async fn unload(&self, record: SupplyRecord) -> Result<Vec<AssayCode>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Unload { record, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Inserts or replaces a device and re-evaluates its classification.
    pub async fn apply_device(&self, device: Device) -> Result<Vec<AssayCode>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ApplyDevice { device, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Removes a device and re-evaluates its classification.
    pub async fn remove_device(&self, sn: impl Into<DeviceSn>) -> Result<Vec<AssayCode>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::RemoveDevice { sn: sn.into(), resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Recomputes every mask flag against the current registry.
    pub async fn refresh_masks(&self) -> Result<Vec<AssayCode>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::RefreshMasks { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Read-only copy of one status.
    pub async fn get(&self, code: AssayCode) -> Result<Option<AssayStatusView>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Get { code, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Read-only copies of every status, ordered by code.
    pub async fn snapshot(&self) -> Result<Vec<AssayStatusView>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Engine counters at the time the command is handled.
    pub async fn stats(&self) -> Result<EngineStats, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stats { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Stops the engine task after the commands queued before this one.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    async fn send(&self, cmd: Command) -> Result<(), RuntimeError> {
        self.cmd_tx.send(cmd).await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

fn handle_command<R: DeviceRegistry>(
    cmd: Command,
    engine: &mut AggregationEngine<R>,
    events_tx: &broadcast::Sender<StatusEvent>,
) -> bool {
    match cmd {
        Command::LoadCatalogue { definitions, resp } => {
            let res = engine.load_catalogue(&definitions).map_err(RuntimeError::from);
            if let Ok(count) = res {
                let _ = events_tx.send(StatusEvent::CatalogueLoaded { count });
            }
            let _ = resp.send(res);
        }
        Command::InitStatus { definition, resp } => {
            let res = engine
                .init_status(&definition)
                .map(|delta| publish(events_tx, delta))
                .map_err(RuntimeError::from);
            let _ = resp.send(res);
        }
        Command::Rebuild { code, resp } => {
            let res = engine
                .rebuild_status(code)
                .map(|delta| publish(events_tx, delta))
                .map_err(RuntimeError::from);
            let _ = resp.send(res);
        }
        Command::Update { record, resp } => {
            let delta = engine.update_assay_status(&record);
            let _ = resp.send(publish(events_tx, delta));
        }
        Command::Unload { record, resp } => {
            let delta = engine.unload_reagent(&record);
            let _ = resp.send(publish(events_tx, delta));
        }
        Command::ApplyDevice { device, resp } => {
            let delta = engine.apply_device(device);
            let _ = resp.send(publish(events_tx, delta));
        }
        Command::RemoveDevice { sn, resp } => {
            let delta = engine.remove_device(&sn);
            let _ = resp.send(publish(events_tx, delta));
        }
        Command::RefreshMasks { resp } => {
            let delta = engine.refresh_masks();
            let _ = resp.send(publish(events_tx, delta));
        }
        Command::Get { code, resp } => {
            let _ = resp.send(engine.status(code).map(AssayStatus::view));
        }
        Command::Snapshot { resp } => {
            let _ = resp.send(engine.store().snapshot());
        }
        Command::Stats { resp } => {
            let _ = resp.send(engine.stats());
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(());
            return true;
        }
    }

    false
}

/// Broadcasts one batched event for a non-empty delta.
fn publish(events_tx: &broadcast::Sender<StatusEvent>, delta: StatusDelta) -> Vec<AssayCode> {
    let codes = delta.into_codes();
    if !codes.is_empty() {
        debug!(codes = ?codes, "publishing changed assay codes");
        let _ = events_tx.send(StatusEvent::AssayCodesChanged { codes: codes.clone() });
    }
    codes
}
