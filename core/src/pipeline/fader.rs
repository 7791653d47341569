//! Fader/Patch Layer (§4.D): operator-set values and per-channel display attributes.

use crate::config::ConfigSnapshot;
use crate::error::DmxxError;
use crate::model::source_tag::SourceTag;
use crate::universe::UniverseStore;

/// Validates a 1-indexed channel number is in the addressable `1..=512` range.
pub fn validate_channel(channel: u16) -> Result<(), DmxxError> {
    if (1..=512).contains(&channel) {
        Ok(())
    } else {
        Err(DmxxError::OutOfRange(format!(
            "channel {channel} outside 1..=512"
        )))
    }
}

/// Sets one operator-layer channel value, attributing it to `client_id`.
///
/// This is the sole entry point for operator writes (§4.D); it never touches the
/// input-merged or output layers, which the pipeline tick recomputes independently.
pub fn set_channel(
    store: &UniverseStore,
    universe_id: u32,
    channel: u16,
    value: u8,
    client_id: u32,
) -> Result<(), DmxxError> {
    validate_channel(channel)?;
    store
        .with_state_mut(universe_id, |state| {
            let idx = (channel - 1) as usize;
            state.operator[idx] = value;
            state.source_tags[idx] = SourceTag::user(client_id);
        })
        .ok_or_else(|| DmxxError::UniverseNotFound(universe_id.to_string()))
}

/// Bulk operator write: applies every `(channel, value)` pair, attributing all of them
/// to `client_id`. Rejects the whole batch (no partial mutation) if any channel index is
/// out of range.
pub fn set_channels(
    store: &UniverseStore,
    universe_id: u32,
    values: &[(u16, u8)],
    client_id: u32,
) -> Result<(), DmxxError> {
    for &(channel, _) in values {
        validate_channel(channel)?;
    }
    store
        .with_state_mut(universe_id, |state| {
            for &(channel, value) in values {
                let idx = (channel - 1) as usize;
                state.operator[idx] = value;
                state.source_tags[idx] = SourceTag::user(client_id);
            }
        })
        .ok_or_else(|| DmxxError::UniverseNotFound(universe_id.to_string()))
}

/// Display attributes for one channel, derived from the patch set and fixture profiles.
/// These are pushed to clients on patch change but never feed into output computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDisplay {
    pub label: String,
    pub color: Option<String>,
}

/// Resolves the display attributes for `(universe_id, channel)` from the current
/// configuration snapshot, if a patch covers that channel.
pub fn resolve_display(
    snapshot: &ConfigSnapshot,
    universe_id: u32,
    channel: u16,
) -> Option<ChannelDisplay> {
    for patch in snapshot.patches.iter().filter(|p| p.universe_id == universe_id) {
        let fixture = snapshot.fixture(patch.fixture_id)?;
        let (start, end) = patch.channel_range(fixture);
        if channel < start || channel > end {
            continue;
        }
        let offset = channel - start;
        let role_label = fixture
            .channels
            .iter()
            .find(|c| c.offset == offset)
            .map(|c| c.label.clone())
            .unwrap_or_else(|| format!("ch{offset}"));
        return Some(ChannelDisplay {
            label: format!("{} {}", fixture.name, role_label),
            color: None,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixture::{ChannelRole, Fixture, FixtureChannel};
    use crate::model::patch::Patch;

    #[test]
    fn set_channel_updates_operator_layer_and_tags_the_client() {
        let store = UniverseStore::new([1]);
        set_channel(&store, 1, 1, 200, 42).unwrap();
        let snapshot = store.snapshot(1).unwrap();
        assert_eq!(snapshot.operator[0], 200);
        assert_eq!(snapshot.source_tags[0], SourceTag::user(42));
    }

    #[test]
    fn set_channel_rejects_out_of_range_channel() {
        let store = UniverseStore::new([1]);
        assert!(set_channel(&store, 1, 0, 10, 1).is_err());
        assert!(set_channel(&store, 1, 513, 10, 1).is_err());
    }

    #[test]
    fn set_channel_rejects_unknown_universe() {
        let store = UniverseStore::new([1]);
        assert!(set_channel(&store, 99, 1, 10, 1).is_err());
    }

    #[test]
    fn set_channels_applies_every_pair() {
        let store = UniverseStore::new([1]);
        set_channels(&store, 1, &[(1, 10), (512, 20)], 5).unwrap();
        let snapshot = store.snapshot(1).unwrap();
        assert_eq!(snapshot.operator[0], 10);
        assert_eq!(snapshot.operator[511], 20);
    }

    #[test]
    fn set_channels_rejects_the_whole_batch_on_one_bad_index() {
        let store = UniverseStore::new([1]);
        let result = set_channels(&store, 1, &[(1, 10), (0, 20)], 5);
        assert!(result.is_err());
        let snapshot = store.snapshot(1).unwrap();
        assert_eq!(snapshot.operator[0], 0, "no partial mutation should occur");
    }

    #[test]
    fn resolve_display_finds_the_covering_patch() {
        let mut snapshot = ConfigSnapshot::default();
        snapshot.fixtures.push(Fixture {
            id: 1,
            name: "RGB".into(),
            channels: vec![FixtureChannel {
                offset: 1,
                role: ChannelRole::Green,
                label: "G".into(),
            }],
        });
        snapshot.patches.push(Patch {
            id: 1,
            fixture_id: 1,
            universe_id: 1,
            start_channel: 10,
        });
        let display = resolve_display(&snapshot, 1, 11).unwrap();
        assert_eq!(display.label, "RGB G");
        assert!(resolve_display(&snapshot, 1, 99).is_none());
    }
}
