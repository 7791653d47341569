//! Event system for real-time client communication.
//!
//! This module provides:
//! - [`EventEmitter`] trait for domain services to emit events
//! - [`ServerEvent`], the wire-level event enum broadcast to connected clients
//!
//! The actual transport implementation (WebSocket fan-out) lives in [`crate::api::ws`],
//! wired up here via [`BroadcastEventBridge`].

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

use crate::model::source_tag::SourceTag;

/// A single channel delta within a `channel_change` event.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelDelta {
    /// 1-indexed channel within the universe.
    pub channel: u16,
    /// New output value.
    pub value: u8,
}

/// One universe's worth of values in an `all_values` snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct UniverseValues {
    pub universe_id: u32,
    pub values: Vec<u8>,
}

/// Snapshot handed to a client immediately after `connected`.
#[derive(Debug, Clone, Serialize)]
pub struct InitialSnapshot {
    pub universes: Vec<UniverseValues>,
    pub active_scene_id: Option<u64>,
    pub global_grandmaster: u8,
}

/// Events broadcast to connected message-hub clients.
///
/// Serializes as `{"type": "<name>", "data": {...}}`, matching the client protocol's
/// wire contract exactly: every variant name here is the literal `type` string sent on
/// the wire (`rename_all = "snake_case"` turns `ChannelChange` into `channel_change`).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once per connection immediately after the auth handshake completes.
    Connected {
        client_id: String,
        initial_snapshot: InitialSnapshot,
    },
    /// Granular deltas for one universe; emitted when fewer than
    /// [`crate::protocol_constants::CHANGE_BATCH_THRESHOLD`] channels changed this tick.
    ChannelChange {
        universe_id: u32,
        changes: Vec<ChannelDelta>,
        source: String,
    },
    /// Full-universe snapshot; emitted when the batching threshold was exceeded.
    Values {
        universe_id: u32,
        values: Vec<u8>,
        source: String,
    },
    /// Full snapshot of every universe, in response to `get_all_universes`.
    AllValues { universes: Vec<UniverseValues> },
    /// Pre-mapping input-layer values for one universe, in response to `get_input_values`.
    InputValues { universe_id: u32, values: Vec<u8> },
    /// Global blackout toggled.
    Blackout { active: bool, source: String },
    /// A scene recall started or completed.
    ActiveSceneChanged {
        scene_id: Option<u64>,
        transition_ms: u64,
        source: String,
    },
    /// Highlight/solo state changed.
    HighlightUpdate {
        active: bool,
        dim_level: u8,
        channels: Vec<(u32, u16)>,
        source: String,
    },
    /// Park entries changed.
    ParkUpdate {
        entries: Vec<(u32, u16, u8)>,
        source: String,
    },
    /// Global or per-universe grandmaster changed.
    GrandmasterChanged {
        universe_id: Option<u32>,
        value: u8,
        source: String,
    },
    /// Scene configuration was mutated by the HTTP collaborator; clients should refetch.
    ScenesChanged,
    /// Patch configuration was mutated by the HTTP collaborator; clients should refetch.
    PatchesChanged,
    /// Fixture library was mutated by the HTTP collaborator; clients should refetch.
    FixturesChanged,
    /// Input/output configuration was mutated by the HTTP collaborator; clients should refetch.
    IoChanged,
    /// Mapping tables were mutated by the HTTP collaborator; clients should refetch.
    MappingChanged,
    /// Group/grid configuration was mutated by the HTTP collaborator; clients should refetch.
    GroupsChanged,
    /// A group's master value changed.
    GroupValueChanged {
        group_id: u64,
        master_value: u8,
        source: String,
    },
    /// Input bypass was toggled for a universe.
    InputBypassChanged { universe_id: u32, bypass: bool },
    /// A command from this client was rejected; sent only to the offending client.
    Error { code: String, message: String },
}

impl ServerEvent {
    /// Returns the wire-level `source` attribution string for a [`SourceTag`]
    /// (`input`, `user:<id>`, …).
    pub fn source_string(tag: &SourceTag) -> String {
        tag.to_wire_string()
    }
}
