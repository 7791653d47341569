//! The engine task (§5): the single writer of channel state, ticking the whole pipeline
//! at a configured cadence and draining the command queue at each tick boundary.
//!
//! Everything that isn't a bare channel array write lives here rather than split across
//! smaller actors, matching §5's "shares the engine task" option for both the output
//! scheduler and scene-transition sampling: a scene fade is a cheap pure function
//! ([`SceneTransition::sample`]) and sampling it inline keeps the whole tick
//! single-threaded and lock-free, at the cost of requiring the configured tick rate to
//! stay at or above [`crate::protocol_constants::SCENE_FADE_MIN_HZ`] while a scene is
//! running. The nominal 44 Hz default already clears that bar; a deployment that drops to
//! the 20 Hz floor will see scene fades sampled coarser than ticks, which is a documented
//! trade-off rather than a bug.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::command::{Command, CommandReceiver};
use crate::config::SharedSnapshot;
use crate::events::{ChannelDelta, EventEmitter, ServerEvent, UniverseValues};
use crate::model::mapping::MapDestination;
use crate::model::scene::TransitionType;
use crate::model::source_tag::SourceTag;
use crate::model::universe::Universe;
use crate::output::{self, OutputTransmitter};
use crate::pipeline::fader;
use crate::pipeline::groups::{self, GroupEffects, LatchTracker};
use crate::pipeline::mapper::map_frame;
use crate::pipeline::modifiers::HighlightState;
use crate::pipeline::{run_universe_tick, GrandmasterState};
use crate::protocol_constants::{OUTPUT_RATE_FLOOR_HZ, OUTPUT_RATE_NOMINAL_HZ};
use crate::scene::SceneTransition;
use crate::universe::UniverseStore;

/// Lightweight, read-mostly engine state the HTTP/WS layer needs without reaching into
/// the engine task itself: the currently-active scene and the global master. Published
/// once per tick via [`ArcSwap`], the same pattern as [`crate::config::SharedSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct EngineStatus {
    pub global_grandmaster: u8,
    pub active_scene_id: Option<u64>,
}

/// Shared handle to the latest [`EngineStatus`].
pub type SharedEngineStatus = Arc<ArcSwap<EngineStatus>>;

/// Builds a fresh [`SharedEngineStatus`] at its zero value.
pub fn shared_engine_status() -> SharedEngineStatus {
    Arc::new(ArcSwap::new(Arc::new(EngineStatus::default())))
}

/// The single owner of mutable channel state (§5). Holds every piece of live,
/// tick-to-tick engine state that is not part of the (atomically swapped) configuration
/// snapshot: masters, highlight, park, blackout, group explicit values, and the one
/// currently-running scene transition.
pub struct Engine {
    store: Arc<UniverseStore>,
    snapshot: SharedSnapshot,
    commands: CommandReceiver,
    emitter: Arc<dyn EventEmitter>,
    transmitter: OutputTransmitter,
    tick_rate_hz: u32,
    status: SharedEngineStatus,

    masters: GrandmasterState,
    highlight: HighlightState,
    parked: HashMap<(u32, u16), u8>,
    blackout: bool,
    group_master_explicit: HashMap<u64, u8>,
    latch_tracker: LatchTracker,
    input_bypass: HashMap<u32, bool>,
    active_scene: Option<SceneTransition>,
}

impl Engine {
    pub fn new(
        store: Arc<UniverseStore>,
        snapshot: SharedSnapshot,
        commands: CommandReceiver,
        emitter: Arc<dyn EventEmitter>,
        tick_rate_hz: u32,
        status: SharedEngineStatus,
    ) -> Self {
        Self {
            store,
            snapshot,
            commands,
            emitter,
            transmitter: OutputTransmitter::new(),
            tick_rate_hz: tick_rate_hz.clamp(OUTPUT_RATE_FLOOR_HZ, OUTPUT_RATE_NOMINAL_HZ),
            status,
            masters: GrandmasterState::default(),
            highlight: HighlightState::default(),
            parked: HashMap::new(),
            blackout: false,
            group_master_explicit: HashMap::new(),
            latch_tracker: LatchTracker::new(),
            input_bypass: HashMap::new(),
            active_scene: None,
        }
    }

    /// Runs the tick loop until `cancel` fires. Never skips a tick on overrun: a slow
    /// tick is logged and the loop resumes at the next scheduled boundary
    /// ([`MissedTickBehavior::Delay`]), per §4.I's monotone-tick requirement.
    pub async fn run(mut self, cancel: CancellationToken) {
        let period = Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("[engine] shutting down");
                    return;
                }
                tick_start = ticker.tick() => {
                    let _ = tick_start;
                    self.tick().await;
                }
            }
        }
    }

    /// Drains the command queue, then runs one full pipeline pass for every configured
    /// universe, emitting diff events and transmitting output.
    async fn tick(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply_command(command);
        }

        self.sample_active_scene(Instant::now());

        let snapshot = self.snapshot.load_full();

        let resolved_masters = groups::resolve_master_values(&snapshot.groups, &self.group_master_explicit);
        let group_effects = groups::apply_groups(&snapshot.groups, &resolved_masters, &self.latch_tracker, |universe_id, channel| {
            self.store
                .snapshot(universe_id)
                .map(|s| s.operator[(channel - 1) as usize])
                .unwrap_or(0)
        });
        self.latch_tracker.commit(&resolved_masters);
        let masters = self.masters.resolve(&group_effects);

        for universe in &snapshot.universes {
            self.tick_universe(universe, &group_effects, &masters).await;
        }

        self.status.store(Arc::new(EngineStatus {
            global_grandmaster: masters.global_master,
            active_scene_id: self.active_scene.as_ref().map(|t| t.scene_id),
        }));
    }

    async fn tick_universe(&mut self, universe: &Universe, group_effects: &GroupEffects, masters: &GrandmasterState) {
        let Some(state) = self.store.snapshot(universe.id) else {
            return;
        };
        let input_bypass_active = self.input_bypass.get(&universe.id).copied().unwrap_or(false);

        let result = run_universe_tick(
            universe.id,
            state.operator,
            state.input_merged,
            state.source_tags,
            universe.passthrough_mode,
            input_bypass_active,
            group_effects,
            &self.highlight,
            &self.parked,
            self.blackout,
            masters,
        );

        let last_output = state.output;
        self.store.with_state_mut(universe.id, |s| {
            s.output = result.output;
            s.source_tags = result.source_tags;
        });

        match output::diff_against_last(&last_output, &result.output) {
            output::UniverseDiff::Unchanged => {}
            output::UniverseDiff::Changes(changes) => {
                let source = representative_source(&changes, &result.source_tags);
                self.emitter.emit(ServerEvent::ChannelChange {
                    universe_id: universe.id,
                    changes,
                    source,
                });
            }
            output::UniverseDiff::Snapshot(values) => {
                let source = SourceTag::UNKNOWN.to_wire_string();
                self.emitter.emit(ServerEvent::Values {
                    universe_id: universe.id,
                    values,
                    source,
                });
            }
        }

        if let Err(e) = self.transmitter.transmit(universe, &result.output).await {
            log::warn!("[engine] output transmit failed for universe {}: {e}", universe.id);
        }
    }

    fn sample_active_scene(&mut self, now: Instant) {
        let Some(transition) = &self.active_scene else {
            return;
        };
        let store = &self.store;
        let group_master_explicit = &self.group_master_explicit;
        let sample = transition.sample(
            now,
            |universe_id, channel| {
                store
                    .snapshot(universe_id)
                    .map(|s| s.operator[(channel - 1) as usize])
                    .unwrap_or(0)
            },
            |group_id| group_master_explicit.get(&group_id).copied().unwrap_or(0),
        );
        let scene_id = transition.scene_id;

        for (&(universe_id, channel), &value) in &sample.channels {
            self.store.with_state_mut(universe_id, |state| {
                let idx = (channel - 1) as usize;
                state.operator[idx] = value;
                state.source_tags[idx] = SourceTag::scene(scene_id as u32);
            });
        }
        for (&group_id, &value) in &sample.groups {
            self.group_master_explicit.insert(group_id, value);
        }

        if sample.done {
            self.active_scene = None;
        }
    }

    fn apply_command(&mut self, command: Command) {
        match command {
            Command::SetChannel { universe_id, channel, value, client_id } => {
                let _ = fader::set_channel(&self.store, universe_id, channel, value, client_id);
            }
            Command::SetChannels { universe_id, values, client_id } => {
                let _ = fader::set_channels(&self.store, universe_id, &values, client_id);
            }
            Command::InputFrame(frame) => self.apply_input_frame(frame),
            Command::RecallScene { scene_id, transition_override, client_id } => {
                self.recall_scene(scene_id, transition_override, client_id);
            }
            Command::CancelSceneTransition { .. } => {
                // No snap-back (§5): the operator layer already holds the last sampled
                // frame, so dropping the transition object is the whole cancellation.
                self.active_scene = None;
            }
            Command::SetGlobalGrandmaster { value, client_id } => {
                self.masters.global_master = value;
                self.emitter.emit(ServerEvent::GrandmasterChanged {
                    universe_id: None,
                    value,
                    source: SourceTag::user(client_id).to_wire_string(),
                });
            }
            Command::SetUniverseGrandmaster { universe_id, value, client_id } => {
                self.masters.universe_masters.insert(universe_id, value);
                self.emitter.emit(ServerEvent::GrandmasterChanged {
                    universe_id: Some(universe_id),
                    value,
                    source: SourceTag::user(client_id).to_wire_string(),
                });
            }
            Command::SetGroupMaster { group_id, value, client_id } => {
                self.group_master_explicit.insert(group_id, value);
                self.emitter.emit(ServerEvent::GroupValueChanged {
                    group_id,
                    master_value: value,
                    source: SourceTag::user(client_id).to_wire_string(),
                });
            }
            Command::Park { universe_id, channel, value, client_id } => {
                self.parked.insert((universe_id, channel), value);
                self.emit_park_update(client_id);
            }
            Command::Unpark { universe_id, channel, client_id } => {
                self.parked.remove(&(universe_id, channel));
                self.emit_park_update(client_id);
            }
            Command::SetHighlight { active, dim_level, channels, client_id } => {
                self.highlight = HighlightState {
                    active,
                    channels: channels.iter().copied().collect(),
                    dim_level,
                };
                self.emitter.emit(ServerEvent::HighlightUpdate {
                    active,
                    dim_level,
                    channels,
                    source: SourceTag::user(client_id).to_wire_string(),
                });
            }
            Command::SetBlackout { active, client_id } => {
                self.blackout = active;
                self.emitter.emit(ServerEvent::Blackout {
                    active,
                    source: SourceTag::user(client_id).to_wire_string(),
                });
            }
            Command::SetInputBypass { universe_id, active, client_id } => {
                self.input_bypass.insert(universe_id, active);
                let _ = client_id;
                self.emitter.emit(ServerEvent::InputBypassChanged { universe_id, bypass: active });
            }
            Command::ConfigSnapshotChanged => {
                // The HTTP collaborator already validated and swapped the snapshot
                // (§7); nothing in the live engine state references config ids directly
                // enough to need reconciliation beyond what the next tick's lookups
                // naturally drop (a park/highlight entry for a since-removed channel is
                // harmless: it just never matches a universe again).
            }
            Command::ClientDisconnected { .. } => {
                // Park/highlight state outlives the connection that set it (§4.F).
            }
        }
    }

    fn emit_park_update(&self, client_id: u32) {
        let entries = self
            .parked
            .iter()
            .map(|(&(universe_id, channel), &value)| (universe_id, channel, value))
            .collect();
        self.emitter.emit(ServerEvent::ParkUpdate {
            entries,
            source: SourceTag::user(client_id).to_wire_string(),
        });
    }

    fn recall_scene(&mut self, scene_id: u64, transition_override: Option<TransitionType>, client_id: u32) {
        let snapshot = self.snapshot.load_full();
        let Some(scene) = snapshot.scene(scene_id) else {
            log::warn!("[engine] recall of unknown scene {scene_id}");
            return;
        };

        let store = Arc::clone(&self.store);
        let group_master_explicit = self.group_master_explicit.clone();
        let transition = SceneTransition::start(
            scene,
            transition_override,
            move |universe_id, channel| {
                store
                    .snapshot(universe_id)
                    .map(|s| s.operator[(channel - 1) as usize])
                    .unwrap_or(0)
            },
            move |group_id| group_master_explicit.get(&group_id).copied().unwrap_or(0),
            Instant::now(),
        );
        let duration_ms = transition.duration.as_millis() as u64;
        self.active_scene = Some(transition);

        self.emitter.emit(ServerEvent::ActiveSceneChanged {
            scene_id: Some(scene_id),
            transition_ms: duration_ms,
            source: SourceTag::user(client_id).to_wire_string(),
        });
    }

    fn apply_input_frame(&mut self, frame: crate::input::InputFrame) {
        let snapshot = self.snapshot.load_full();
        let active_table = snapshot
            .mapping_tables
            .iter()
            .find(|t| t.enabled);

        for write in map_frame(&frame, active_table) {
            match write.dst {
                MapDestination::Channel { universe_id, channel } => {
                    self.store.with_state_mut(universe_id, |state| {
                        let idx = (channel - 1) as usize;
                        state.input_merged[idx] = write.value;
                        state.source_tags[idx] = SourceTag::INPUT;
                    });
                }
                MapDestination::GlobalMaster => {
                    self.masters.global_master = write.value;
                }
                MapDestination::UniverseMaster { universe_id } => {
                    self.masters.universe_masters.insert(universe_id, write.value);
                }
            }
        }
    }
}

/// Picks the `source` string for a batch of granular changes: the tag of the
/// first-changed channel. Mixed-origin batches are rare (one tick's changes usually share
/// a cause) and this is advisory-only per [`SourceTag`]'s own contract.
fn representative_source(changes: &[ChannelDelta], tags: &[SourceTag; Universe::CHANNEL_COUNT]) -> String {
    changes
        .first()
        .map(|c| tags[(c.channel - 1) as usize].to_wire_string())
        .unwrap_or_else(|| SourceTag::UNKNOWN.to_wire_string())
}

/// Builds the `initial_snapshot` payload sent to a client immediately after connecting
/// (§4.J).
pub fn build_all_values(store: &UniverseStore) -> Vec<UniverseValues> {
    store
        .snapshot_all()
        .into_iter()
        .map(|s| UniverseValues {
            universe_id: s.universe_id,
            values: s.output.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::command_channel;
    use crate::config::{shared_snapshot, ConfigSnapshot};
    use crate::events::NoopEventEmitter;
    use crate::model::universe::{PassthroughMode, Universe};

    fn test_universe(id: u32) -> Universe {
        Universe {
            id,
            label: format!("u{id}"),
            input: None,
            output: None,
            passthrough_mode: PassthroughMode::Off,
            master_fader_color: None,
        }
    }

    fn test_engine(universe_ids: &[u32]) -> Engine {
        let store = Arc::new(UniverseStore::new(universe_ids.iter().copied()));
        let mut config = ConfigSnapshot::default();
        config.universes = universe_ids.iter().map(|&id| test_universe(id)).collect();
        let snapshot = shared_snapshot(config);
        let (_tx, rx) = command_channel(16);
        Engine::new(store, snapshot, rx, Arc::new(NoopEventEmitter), 44, shared_engine_status())
    }

    #[tokio::test]
    async fn set_channel_command_lands_in_the_operator_layer_by_next_tick() {
        let mut engine = test_engine(&[1]);
        engine.apply_command(Command::SetChannel {
            universe_id: 1,
            channel: 1,
            value: 200,
            client_id: 1,
        });
        engine.tick().await;
        let snapshot = engine.store.snapshot(1).unwrap();
        assert_eq!(snapshot.output[0], 200);
    }

    #[tokio::test]
    async fn blackout_zeroes_output_even_with_operator_values_set() {
        let mut engine = test_engine(&[1]);
        engine.apply_command(Command::SetChannel {
            universe_id: 1,
            channel: 1,
            value: 200,
            client_id: 1,
        });
        engine.apply_command(Command::SetBlackout { active: true, client_id: 1 });
        engine.tick().await;
        let snapshot = engine.store.snapshot(1).unwrap();
        assert_eq!(snapshot.output[0], 0);
    }

    #[tokio::test]
    async fn park_survives_blackout_end_to_end() {
        let mut engine = test_engine(&[1]);
        engine.apply_command(Command::Park {
            universe_id: 1,
            channel: 1,
            value: 222,
            client_id: 1,
        });
        engine.apply_command(Command::SetBlackout { active: true, client_id: 1 });
        engine.tick().await;
        let snapshot = engine.store.snapshot(1).unwrap();
        assert_eq!(snapshot.output[0], 222);
    }

    #[tokio::test]
    async fn unknown_scene_recall_is_logged_and_ignored() {
        let mut engine = test_engine(&[1]);
        engine.apply_command(Command::RecallScene {
            scene_id: 999,
            transition_override: None,
            client_id: 1,
        });
        assert!(engine.active_scene.is_none());
    }

    #[tokio::test]
    async fn tick_publishes_the_resolved_global_master_to_shared_status() {
        let mut engine = test_engine(&[1]);
        let status = Arc::clone(&engine.status);
        engine.apply_command(Command::SetGlobalGrandmaster { value: 200, client_id: 1 });
        engine.tick().await;
        assert_eq!(status.load().global_grandmaster, 200);
    }
}
