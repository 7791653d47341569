//! The processing pipeline (§4): input -> channel mapping -> fader/patch mixing ->
//! groups -> modifiers -> grandmaster scaling -> output.
//!
//! The Channel Mapper (§4.C) and Fader/Patch Layer (§4.D) write operator claims into
//! [`crate::universe::UniverseStore`] as commands arrive; everything downstream of that
//! (mixing the operator and input-merged layers, groups, modifiers, grandmaster scaling)
//! recomputes from scratch every tick in [`run_universe_tick`], which the engine task
//! calls once per universe per tick and writes the result back into the store's output
//! array.

pub mod fader;
pub mod grandmaster;
pub mod groups;
pub mod mapper;
pub mod modifiers;

use std::collections::HashMap;

use crate::model::source_tag::SourceTag;
use crate::model::universe::{PassthroughMode, Universe};
use groups::GroupEffects;
use modifiers::HighlightState;

/// Per-universe masters, live-settable via `set_global_grandmaster` /
/// `set_universe_grandmaster` (§6) and distinct from the static configuration snapshot.
#[derive(Debug, Clone, Default)]
pub struct GrandmasterState {
    pub global_master: u8,
    pub universe_masters: HashMap<u32, u8>,
}

impl GrandmasterState {
    pub fn universe_master(&self, universe_id: u32) -> u8 {
        self.universe_masters.get(&universe_id).copied().unwrap_or(255)
    }

    /// A group driving the `global_master`/`universe_master` virtual targets (§4.E) wins
    /// over the live-settable value for this tick; this folds those overrides in before
    /// the Grandmaster Scaler runs.
    pub fn resolve(&self, effects: &GroupEffects) -> GrandmasterState {
        let mut resolved = self.clone();
        if let Some(global) = effects.global_master_override {
            resolved.global_master = global;
        }
        for (&universe_id, &value) in &effects.universe_master_overrides {
            resolved.universe_masters.insert(universe_id, value);
        }
        resolved
    }
}

/// Combines the operator and input-merged layers into one pipeline value per channel,
/// per the universe's `passthrough_mode`:
/// - `Off`: highest-takes-precedence between the two layers, the conventional DMX desk
///   merge rule for combining an external source with local fader control.
/// - `FadersOutput`: operator value only; input is ignored for output.
/// - `OutputOnly`: input-merged value only; operator writes don't reach output.
pub fn mix_operator_and_input(
    operator: &[u8; Universe::CHANNEL_COUNT],
    input_merged: &[u8; Universe::CHANNEL_COUNT],
    mode: PassthroughMode,
) -> [u8; Universe::CHANNEL_COUNT] {
    match mode {
        PassthroughMode::Off => {
            let mut mixed = [0u8; Universe::CHANNEL_COUNT];
            for i in 0..Universe::CHANNEL_COUNT {
                mixed[i] = operator[i].max(input_merged[i]);
            }
            mixed
        }
        PassthroughMode::FadersOutput => *operator,
        PassthroughMode::OutputOnly => *input_merged,
    }
}

/// Result of running one universe through the full pipeline for one tick.
pub struct PipelineTickResult {
    pub output: [u8; Universe::CHANNEL_COUNT],
    pub source_tags: [SourceTag; Universe::CHANNEL_COUNT],
}

/// Runs one universe through fader/patch mixing, groups, modifiers, and grandmaster
/// scaling, in that order. `group_effects` and `masters` must already reflect this
/// tick's resolved group propagation (see [`groups::apply_groups`] and
/// [`GrandmasterState::resolve`]).
#[allow(clippy::too_many_arguments)]
pub fn run_universe_tick(
    universe_id: u32,
    operator: [u8; Universe::CHANNEL_COUNT],
    input_merged: [u8; Universe::CHANNEL_COUNT],
    source_tags_in: [SourceTag; Universe::CHANNEL_COUNT],
    passthrough_mode: PassthroughMode,
    input_bypass_active: bool,
    group_effects: &GroupEffects,
    highlight: &HighlightState,
    parked_channels: &HashMap<(u32, u16), u8>,
    blackout_active: bool,
    masters: &GrandmasterState,
) -> PipelineTickResult {
    let input_merged = if input_bypass_active {
        [0u8; Universe::CHANNEL_COUNT]
    } else {
        input_merged
    };

    let mut mixed = mix_operator_and_input(&operator, &input_merged, passthrough_mode);
    let mut tags = source_tags_in;
    for (&(uid, channel), &value) in &group_effects.channel_overrides {
        if uid != universe_id {
            continue;
        }
        let idx = (channel - 1) as usize;
        mixed[idx] = value;
    }

    let modifier_result =
        modifiers::apply_modifiers(universe_id, mixed, tags, highlight, parked_channels, blackout_active);
    tags = modifier_result.source_tags;

    let output = grandmaster::apply_grandmaster(
        modifier_result.values,
        &modifier_result.parked,
        masters.universe_master(universe_id),
        masters.global_master,
    );

    PipelineTickResult {
        output,
        source_tags: tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_mode_merges_by_highest_value() {
        let mut operator = [0u8; Universe::CHANNEL_COUNT];
        let mut input = [0u8; Universe::CHANNEL_COUNT];
        operator[0] = 50;
        input[0] = 200;
        let mixed = mix_operator_and_input(&operator, &input, PassthroughMode::Off);
        assert_eq!(mixed[0], 200);
    }

    #[test]
    fn faders_output_mode_ignores_input() {
        let mut operator = [0u8; Universe::CHANNEL_COUNT];
        let mut input = [0u8; Universe::CHANNEL_COUNT];
        operator[0] = 50;
        input[0] = 200;
        let mixed = mix_operator_and_input(&operator, &input, PassthroughMode::FadersOutput);
        assert_eq!(mixed[0], 50);
    }

    #[test]
    fn output_only_mode_ignores_operator() {
        let mut operator = [0u8; Universe::CHANNEL_COUNT];
        let mut input = [0u8; Universe::CHANNEL_COUNT];
        operator[0] = 50;
        input[0] = 200;
        let mixed = mix_operator_and_input(&operator, &input, PassthroughMode::OutputOnly);
        assert_eq!(mixed[0], 200);
    }

    #[test]
    fn input_bypass_zeroes_the_input_layer_before_merging() {
        let mut operator = [0u8; Universe::CHANNEL_COUNT];
        let mut input = [0u8; Universe::CHANNEL_COUNT];
        operator[0] = 50;
        input[0] = 200;
        let result = run_universe_tick(
            1,
            operator,
            input,
            [SourceTag::UNKNOWN; Universe::CHANNEL_COUNT],
            PassthroughMode::Off,
            true,
            &GroupEffects::default(),
            &HighlightState::default(),
            &HashMap::new(),
            false,
            &GrandmasterState {
                global_master: 255,
                universe_masters: HashMap::new(),
            },
        );
        assert_eq!(result.output[0], 50, "bypass drops the input layer, operator still controls");
    }

    #[test]
    fn end_to_end_grandmaster_scenario_matches_the_documented_example() {
        let mut operator = [0u8; Universe::CHANNEL_COUNT];
        operator[0] = 200;
        let masters = GrandmasterState {
            global_master: 128,
            universe_masters: HashMap::from([(1u32, 128u8)]),
        };
        let result = run_universe_tick(
            1,
            operator,
            [0u8; Universe::CHANNEL_COUNT],
            [SourceTag::UNKNOWN; Universe::CHANNEL_COUNT],
            PassthroughMode::Off,
            false,
            &GroupEffects::default(),
            &HighlightState::default(),
            &HashMap::new(),
            false,
            &masters,
        );
        assert_eq!(result.output[0], 50);
    }

    #[test]
    fn a_group_driving_the_global_master_virtual_target_overrides_the_live_value() {
        let state = GrandmasterState {
            global_master: 255,
            universe_masters: HashMap::new(),
        };
        let effects = GroupEffects {
            global_master_override: Some(64),
            ..Default::default()
        };
        let resolved = state.resolve(&effects);
        assert_eq!(resolved.global_master, 64);
    }
}
