//! Scene Engine (§4.H): capture and wall-clock-driven recall of operator-layer snapshots.
//!
//! A running transition is a pure value, sampled by the engine task once per tick; the
//! engine is responsible for feeding samples into the operator layer and for dropping a
//! transition outright on preemption (§5: "freezes at its last interpolated frame, no
//! snap-back" is just "stop sampling it", since nothing un-writes what was already
//! written).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::model::scene::{Scene, TransitionType};

/// One channel's value at capture time, keyed the same way as [`Scene::captured`].
type ChannelMap = HashMap<u32, HashMap<u16, u8>>;

/// Builds the `captured`/`groups` maps for a new [`Scene`] from the engine's live state.
/// `universe_ids` and `group_ids` select what this save includes.
pub fn capture(
    universe_ids: &[u32],
    group_ids: &[u64],
    operator_value: impl Fn(u32, u16) -> u8,
    group_master_value: impl Fn(u64) -> u8,
) -> (ChannelMap, HashMap<u64, u8>) {
    let mut captured = ChannelMap::new();
    for &universe_id in universe_ids {
        let mut channels = HashMap::new();
        for channel in 1..=512u16 {
            channels.insert(channel, operator_value(universe_id, channel));
        }
        captured.insert(universe_id, channels);
    }
    let groups = group_ids
        .iter()
        .map(|&id| (id, group_master_value(id)))
        .collect();
    (captured, groups)
}

/// A running scene recall, sampled once per engine tick.
///
/// `from` is captured at [`SceneTransition::start`] either way, but the two transition
/// types use it differently in [`SceneTransition::sample`]:
/// - `crossfade` interpolates from the frozen `from` baseline for the whole run, so a
///   concurrent operator edit on a participating channel is overridden on the next tick
///   (§4.H: the "from" set is frozen at recall time).
/// - `fade` re-reads the live operator layer as its baseline on every tick instead of
///   using the frozen snapshot, so a concurrent edit shows through: the next sample
///   blends from wherever the operator just left the channel, not from the value at
///   recall time.
pub struct SceneTransition {
    pub scene_id: u64,
    pub transition_type: TransitionType,
    pub duration: Duration,
    pub started_at: Instant,
    from: ChannelMap,
    to: ChannelMap,
    from_groups: HashMap<u64, u8>,
    to_groups: HashMap<u64, u8>,
}

/// One tick's worth of interpolated values for a running transition.
pub struct SceneSample {
    /// `(universe_id, channel) -> value`, covering only channels the recalled scene
    /// captured.
    pub channels: HashMap<(u32, u16), u8>,
    pub groups: HashMap<u64, u8>,
    pub done: bool,
}

impl SceneTransition {
    /// Starts a recall of `scene`, capturing the current operator/group values as the
    /// `from` baseline. `transition_override` replaces the scene's configured transition
    /// type for this recall only (§6: `set_active_scene` does not carry an override, but
    /// the HTTP recall endpoint can).
    pub fn start(
        scene: &Scene,
        transition_override: Option<TransitionType>,
        current_operator: impl Fn(u32, u16) -> u8,
        current_group_master: impl Fn(u64) -> u8,
        now: Instant,
    ) -> Self {
        let transition_type = transition_override.unwrap_or(scene.transition_type);

        let mut from = ChannelMap::new();
        for (&universe_id, channels) in &scene.captured {
            let mut from_channels = HashMap::new();
            for &channel in channels.keys() {
                from_channels.insert(channel, current_operator(universe_id, channel));
            }
            from.insert(universe_id, from_channels);
        }
        let from_groups = scene
            .groups
            .keys()
            .map(|&group_id| (group_id, current_group_master(group_id)))
            .collect();

        Self {
            scene_id: scene.id,
            transition_type,
            duration: Duration::from_millis(scene.duration_ms),
            started_at: now,
            from,
            to: scene.captured.clone(),
            from_groups,
            to_groups: scene.groups.clone(),
        }
    }

    /// `t` in `[0, 1]`: 1 as soon as `now` reaches `started_at + duration`, and always 1
    /// for an `instant` transition or a zero-length duration.
    fn progress(&self, now: Instant) -> f64 {
        if self.transition_type == TransitionType::Instant || self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        (elapsed / self.duration.as_secs_f64()).min(1.0)
    }

    pub fn is_done(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }

    /// Interpolates every captured channel/group at `now`. For a running `fade`,
    /// `current_operator`/`current_group_master` are consulted for the baseline instead
    /// of the frozen `from` snapshot, so a concurrent operator edit is blended toward
    /// `to` rather than overridden; `crossfade` and `instant` ignore both closures and
    /// always interpolate from the frozen baseline.
    pub fn sample(
        &self,
        now: Instant,
        current_operator: impl Fn(u32, u16) -> u8,
        current_group_master: impl Fn(u64) -> u8,
    ) -> SceneSample {
        let t = self.progress(now);
        let live_baseline = self.transition_type == TransitionType::Fade;

        let mut channels = HashMap::new();
        for (&universe_id, to_channels) in &self.to {
            let frozen_channels = self.from.get(&universe_id);
            for (&channel, &to_value) in to_channels {
                let from_value = if live_baseline {
                    current_operator(universe_id, channel)
                } else {
                    frozen_channels
                        .and_then(|m| m.get(&channel))
                        .copied()
                        .unwrap_or(to_value)
                };
                channels.insert((universe_id, channel), lerp_u8(from_value, to_value, t));
            }
        }

        let mut groups = HashMap::new();
        for (&group_id, &to_value) in &self.to_groups {
            let from_value = if live_baseline {
                current_group_master(group_id)
            } else {
                self.from_groups.get(&group_id).copied().unwrap_or(to_value)
            };
            groups.insert(group_id, lerp_u8(from_value, to_value, t));
        }

        SceneSample {
            channels,
            groups,
            done: t >= 1.0,
        }
    }
}

fn lerp_u8(from: u8, to: u8, t: f64) -> u8 {
    let value = f64::from(from) + (f64::from(to) - f64::from(from)) * t;
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::scene::SceneFlags;

    fn scene(transition_type: TransitionType, duration_ms: u64) -> Scene {
        Scene {
            id: 1,
            name: "test".into(),
            transition_type,
            duration_ms,
            captured: HashMap::from([(1u32, HashMap::from([(1u16, 200u8)]))]),
            groups: HashMap::from([(1u64, 180u8)]),
            flags: SceneFlags::default(),
        }
    }

    #[test]
    fn instant_transition_is_done_immediately() {
        let scene = scene(TransitionType::Instant, 5000);
        let transition = SceneTransition::start(&scene, None, |_, _| 0, |_| 0, Instant::now());
        let sample = transition.sample(Instant::now(), |_, _| 0, |_| 0);
        assert!(sample.done);
        assert_eq!(sample.channels[&(1, 1)], 200);
        assert_eq!(sample.groups[&1], 180);
    }

    #[test]
    fn fade_interpolates_linearly_partway_through() {
        let scene = scene(TransitionType::Fade, 1000);
        let start = Instant::now();
        let transition = SceneTransition::start(&scene, None, |_, _| 0, |_| 0, start);
        let midpoint = start + Duration::from_millis(500);
        let sample = transition.sample(midpoint, |_, _| 0, |_| 0);
        assert!(!sample.done);
        assert_eq!(sample.channels[&(1, 1)], 100, "halfway from 0 to 200 is 100");
    }

    #[test]
    fn fade_completes_at_or_past_the_configured_duration() {
        let scene = scene(TransitionType::Fade, 1000);
        let start = Instant::now();
        let transition = SceneTransition::start(&scene, None, |_, _| 0, |_| 0, start);
        let sample = transition.sample(start + Duration::from_millis(1500), |_, _| 0, |_| 0);
        assert!(sample.done);
        assert_eq!(sample.channels[&(1, 1)], 200);
    }

    #[test]
    fn fade_blends_from_a_concurrent_operator_edit_instead_of_the_recall_time_value() {
        let scene = scene(TransitionType::Fade, 1000);
        let start = Instant::now();
        // Operator value at recall time is 0, but by the time this tick samples, the
        // operator has since pushed the channel to 150 - the fade must pick that up as
        // its baseline for this tick rather than keep interpolating from 0.
        let transition = SceneTransition::start(&scene, None, |_, _| 0, |_| 0, start);
        let sample = transition.sample(start + Duration::from_millis(500), |_, _| 150, |_| 0);
        assert_eq!(sample.channels[&(1, 1)], 175, "halfway from the live 150 to 200 is 175");
    }

    #[test]
    fn crossfade_from_set_is_frozen_at_recall_time() {
        let scene = scene(TransitionType::Crossfade, 1000);
        let start = Instant::now();
        // Operator value at recall time is 50; later operator edits during the fade must
        // not shift the baseline, since `from` was already captured into the transition.
        let transition = SceneTransition::start(&scene, None, |_, _| 50, |_| 0, start);
        let sample = transition.sample(start + Duration::from_millis(500), |_, _| 50, |_| 0);
        assert_eq!(sample.channels[&(1, 1)], 125, "halfway from 50 to 200 is 125");
    }

    #[test]
    fn crossfade_ignores_a_concurrent_operator_edit_during_sampling() {
        let scene = scene(TransitionType::Crossfade, 1000);
        let start = Instant::now();
        let transition = SceneTransition::start(&scene, None, |_, _| 50, |_| 0, start);
        // A different value is "live" at sample time than what was frozen at recall; the
        // frozen baseline must still win for crossfade.
        let sample = transition.sample(start + Duration::from_millis(500), |_, _| 250, |_| 0);
        assert_eq!(sample.channels[&(1, 1)], 125, "still halfway from the frozen 50, not 250");
    }

    #[test]
    fn transition_override_replaces_the_scenes_configured_type() {
        let scene = scene(TransitionType::Fade, 1000);
        let transition = SceneTransition::start(
            &scene,
            Some(TransitionType::Instant),
            |_, _| 0,
            |_| 0,
            Instant::now(),
        );
        assert!(transition.is_done(Instant::now()));
    }

    #[test]
    fn capture_reads_every_channel_of_every_selected_universe() {
        let (captured, groups) = capture(&[1], &[1], |_, channel| if channel == 1 { 200 } else { 0 }, |_| 90);
        assert_eq!(captured[&1][&1], 200);
        assert_eq!(captured[&1].len(), 512);
        assert_eq!(groups[&1], 90);
    }
}
