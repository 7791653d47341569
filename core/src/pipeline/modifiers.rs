//! Modifier Layer (§4.F): highlight, park, and blackout, applied strictly in that order.
//!
//! Park overriding blackout is a documented contract (§9, "park wins"): a parked channel
//! keeps its parked value no matter what blackout does, and skips the Grandmaster Scaler
//! entirely (Invariant 2/3 in §9 exempt parked channels from master scaling).

use std::collections::{HashMap, HashSet};

use crate::model::source_tag::SourceTag;
use crate::model::universe::Universe;

/// Active highlight/solo state: when `active`, every channel not in `channels` is dimmed
/// to `dim_level`. An empty `channels` set with `active = true` dims the whole rig, per
/// the documented edge case in §9.
#[derive(Debug, Clone, Default)]
pub struct HighlightState {
    pub active: bool,
    pub channels: HashSet<(u32, u16)>,
    pub dim_level: u8,
}

/// One parked channel: its value is pinned regardless of upstream layers.
#[derive(Debug, Clone, Copy)]
pub struct ParkEntry {
    pub universe_id: u32,
    pub channel: u16,
    pub value: u8,
}

/// Per-channel result of the Modifier Layer, for one universe's 512 channels.
pub struct ModifierResult {
    pub values: [u8; Universe::CHANNEL_COUNT],
    pub source_tags: [SourceTag; Universe::CHANNEL_COUNT],
    /// `true` for a channel the Grandmaster Scaler must pass through unscaled.
    pub parked: [bool; Universe::CHANNEL_COUNT],
}

/// Applies highlight, then park, then blackout to `values`/`source_tags` for one
/// universe.
pub fn apply_modifiers(
    universe_id: u32,
    mut values: [u8; Universe::CHANNEL_COUNT],
    mut source_tags: [SourceTag; Universe::CHANNEL_COUNT],
    highlight: &HighlightState,
    parked_channels: &HashMap<(u32, u16), u8>,
    blackout_active: bool,
) -> ModifierResult {
    if highlight.active {
        for (offset, value) in values.iter_mut().enumerate() {
            let channel = (offset + 1) as u16;
            if !highlight.channels.contains(&(universe_id, channel)) {
                *value = highlight.dim_level;
            }
        }
    }

    let mut parked = [false; Universe::CHANNEL_COUNT];
    for (&(uid, channel), &value) in parked_channels {
        if uid != universe_id {
            continue;
        }
        let idx = (channel - 1) as usize;
        values[idx] = value;
        source_tags[idx] = SourceTag::PARK;
        parked[idx] = true;
    }

    if blackout_active {
        for (idx, value) in values.iter_mut().enumerate() {
            if !parked[idx] {
                *value = 0;
            }
        }
    }

    ModifierResult {
        values,
        source_tags,
        parked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags() -> [SourceTag; Universe::CHANNEL_COUNT] {
        [SourceTag::UNKNOWN; Universe::CHANNEL_COUNT]
    }

    #[test]
    fn highlight_dims_every_channel_outside_the_highlighted_set() {
        let mut values = [200u8; Universe::CHANNEL_COUNT];
        values[0] = 255;
        let highlight = HighlightState {
            active: true,
            channels: HashSet::from([(1u32, 1u16)]),
            dim_level: 10,
        };
        let result = apply_modifiers(1, values, tags(), &highlight, &HashMap::new(), false);
        assert_eq!(result.values[0], 255, "highlighted channel is untouched");
        assert_eq!(result.values[1], 10, "non-highlighted channel is dimmed");
    }

    #[test]
    fn highlight_with_empty_set_dims_the_whole_rig() {
        let values = [200u8; Universe::CHANNEL_COUNT];
        let highlight = HighlightState {
            active: true,
            channels: HashSet::new(),
            dim_level: 5,
        };
        let result = apply_modifiers(1, values, tags(), &highlight, &HashMap::new(), false);
        assert!(result.values.iter().all(|&v| v == 5));
    }

    #[test]
    fn park_overrides_the_upstream_value_and_marks_the_mask() {
        let values = [128u8; Universe::CHANNEL_COUNT];
        let parked = HashMap::from([((1u32, 1u16), 222u8)]);
        let result = apply_modifiers(
            1,
            values,
            tags(),
            &HighlightState::default(),
            &parked,
            false,
        );
        assert_eq!(result.values[0], 222);
        assert!(result.parked[0]);
        assert_eq!(result.source_tags[0], SourceTag::PARK);
    }

    #[test]
    fn blackout_zeroes_everything_except_parked_channels() {
        let values = [128u8; Universe::CHANNEL_COUNT];
        let parked = HashMap::from([((1u32, 1u16), 222u8)]);
        let result =
            apply_modifiers(1, values, tags(), &HighlightState::default(), &parked, true);
        assert_eq!(result.values[0], 222, "parked channel survives blackout");
        assert_eq!(result.values[1], 0, "unparked channel is blacked out");
    }

    #[test]
    fn park_applies_after_highlight_so_a_parked_value_is_never_dimmed() {
        let values = [128u8; Universe::CHANNEL_COUNT];
        let highlight = HighlightState {
            active: true,
            channels: HashSet::new(),
            dim_level: 1,
        };
        let parked = HashMap::from([((1u32, 1u16), 222u8)]);
        let result = apply_modifiers(1, values, tags(), &highlight, &parked, false);
        assert_eq!(result.values[0], 222);
    }
}
