//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where the universe
//! store, configuration snapshot, engine, input receivers, and API-facing channels are
//! instantiated and wired together.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::WsConnectionManager;
use crate::command::{command_channel, Command, CommandSender};
use crate::config::{shared_snapshot, Config, ConfigSnapshot, SharedSnapshot};
use crate::engine::{shared_engine_status, Engine, SharedEngineStatus};
use crate::events::{BroadcastEventBridge, EventEmitter};
use crate::input::artnet::{run_artnet_input, ArtNetInputConfig};
use crate::input::sacn::{run_sacn_input, SacnInputConfig};
use crate::input::{InputFrame, ReceiverStats};
use crate::model::universe::{ProtocolBinding, Universe};
use crate::protocol_constants::{ARTNET_PORT, CLIENT_QUEUE_DEPTH};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::universe::UniverseStore;

/// Container for all bootstrapped services, handed to [`crate::api::AppStateBuilder`].
#[derive(Clone)]
pub struct BootstrappedServices {
    pub store: Arc<UniverseStore>,
    pub snapshot: SharedSnapshot,
    pub commands: CommandSender,
    pub event_bridge: Arc<BroadcastEventBridge>,
    pub ws_manager: Arc<WsConnectionManager>,
    pub engine_status: SharedEngineStatus,
    pub config: Arc<Config>,
    pub cancel_token: CancellationToken,
    spawner: TokioSpawner,
}

impl BootstrappedServices {
    /// Cancels the engine task and every input receiver, and force-closes every live
    /// WebSocket connection.
    pub async fn shutdown(&self) {
        log::info!("[bootstrap] shutting down");
        self.cancel_token.cancel();
        let closed = self.ws_manager.close_all();
        if closed > 0 {
            log::info!("[bootstrap] closed {closed} websocket connection(s)");
        }
    }
}

/// Wires and starts every background task: the engine tick loop and one input receiver
/// per universe that configures an `input` binding. Must be called from within a running
/// tokio runtime.
///
/// Unlike a lazily-started discovery service, the engine must be ticking before the first
/// client connects (output keeps flowing even with nobody watching), so bootstrap both
/// wires and starts in one pass rather than splitting into a separate
/// `start_background_tasks` step.
pub fn bootstrap_services(config: Config, initial_snapshot: ConfigSnapshot) -> BootstrappedServices {
    let spawner = TokioSpawner::current();
    let cancel_token = CancellationToken::new();

    let universe_ids: Vec<u32> = initial_snapshot.universes.iter().map(|u| u.id).collect();
    let store = Arc::new(UniverseStore::new(universe_ids));
    let tick_rate_hz = config.output_rate_hz;
    let config = Arc::new(config);
    let snapshot = shared_snapshot(initial_snapshot.clone());
    let event_bridge = Arc::new(BroadcastEventBridge::new());
    let ws_manager = Arc::new(WsConnectionManager::new());
    let engine_status = shared_engine_status();
    let (commands, command_rx) = command_channel(CLIENT_QUEUE_DEPTH);

    let engine = Engine::new(
        Arc::clone(&store),
        Arc::clone(&snapshot),
        command_rx,
        Arc::clone(&event_bridge) as Arc<dyn EventEmitter>,
        tick_rate_hz,
        Arc::clone(&engine_status),
    );
    spawner.spawn(Box::pin(engine.run(cancel_token.child_token())));

    for universe in &initial_snapshot.universes {
        spawn_input_receiver(&spawner, universe, commands.clone(), cancel_token.child_token());
    }

    BootstrappedServices {
        store,
        snapshot,
        commands,
        event_bridge,
        ws_manager,
        engine_status,
        config,
        cancel_token,
        spawner,
    }
}

/// Spawns the protocol-specific receiver task for `universe.input` (if any) plus the
/// small adapter task that turns its normalized frames into [`Command::InputFrame`]s for
/// the engine's command queue.
fn spawn_input_receiver(
    spawner: &TokioSpawner,
    universe: &Universe,
    commands: CommandSender,
    cancel: CancellationToken,
) {
    let Some(binding) = universe.input.clone() else {
        return;
    };

    let (frame_tx, mut frame_rx) = mpsc::channel::<InputFrame>(CLIENT_QUEUE_DEPTH);
    let stats = ReceiverStats::shared();

    match binding {
        ProtocolBinding::ArtNet { address, net, subnet, universe: wire_universe } => {
            let bind_address = match format!("{address}:{ARTNET_PORT}").parse() {
                Ok(addr) => addr,
                Err(e) => {
                    log::error!(
                        "[bootstrap] invalid Art-Net bind address '{address}' for universe {}: {e}",
                        universe.id
                    );
                    return;
                }
            };
            let receiver_config = ArtNetInputConfig {
                bind_address,
                internal_universe_id: universe.id,
                channel_start: 1,
                channel_end: 512,
                source_name: format!("artnet:{net}.{subnet}.{wire_universe}"),
            };
            spawner.spawn(Box::pin(run_artnet_input(
                receiver_config,
                frame_tx,
                Arc::clone(&stats),
                cancel.clone(),
            )));
        }
        ProtocolBinding::Sacn { universe: wire_universe, .. } => {
            let receiver_config = SacnInputConfig {
                universe: wire_universe,
                internal_universe_id: universe.id,
                channel_start: 1,
                channel_end: 512,
                source_name: format!("sacn:{wire_universe}"),
            };
            spawner.spawn(Box::pin(run_sacn_input(
                receiver_config,
                frame_tx,
                Arc::clone(&stats),
                cancel.clone(),
            )));
        }
    }

    spawner.spawn(Box::pin(async move {
        while let Some(frame) = frame_rx.recv().await {
            if commands.send(Command::InputFrame(frame)).await.is_err() {
                break;
            }
        }
    }));
}
