//! Scene records: captured snapshots of universe and group values with a transition
//! policy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::DmxxError;

/// How a scene recall moves from the current state to the captured one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Instant,
    Fade,
    Crossfade,
}

/// Flags describing what a scene's capture includes beyond channel values.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SceneFlags {
    pub includes_global_master: bool,
    pub includes_universe_masters: bool,
}

/// A captured snapshot of universe and/or group values with a transition policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: u64,
    pub name: String,
    pub transition_type: TransitionType,
    pub duration_ms: u64,
    /// universe id -> sparse map of 1-indexed channel -> captured value.
    pub captured: HashMap<u32, HashMap<u16, u8>>,
    /// group id -> captured master value.
    pub groups: HashMap<u64, u8>,
    pub flags: SceneFlags,
}

impl Scene {
    /// Validates the channel-index invariant: every captured channel index is in 1..512.
    pub fn validate(&self) -> Result<(), DmxxError> {
        for (universe_id, channels) in &self.captured {
            for &channel in channels.keys() {
                if !(1..=512).contains(&channel) {
                    return Err(DmxxError::OutOfRange(format!(
                        "scene {} captures channel {} in universe {}, outside 1..512",
                        self.id, channel, universe_id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_scene() -> Scene {
        Scene {
            id: 1,
            name: "test".into(),
            transition_type: TransitionType::Fade,
            duration_ms: 1000,
            captured: HashMap::new(),
            groups: HashMap::new(),
            flags: SceneFlags::default(),
        }
    }

    #[test]
    fn channel_index_1_and_512_are_both_valid() {
        let mut scene = base_scene();
        scene.captured.insert(1, HashMap::from([(1, 10), (512, 20)]));
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn channel_index_0_is_rejected() {
        let mut scene = base_scene();
        scene.captured.insert(1, HashMap::from([(0, 10)]));
        assert!(scene.validate().is_err());
    }

    #[test]
    fn channel_index_513_is_rejected() {
        let mut scene = base_scene();
        scene.captured.insert(1, HashMap::from([(513, 10)]));
        assert!(scene.validate().is_err());
    }
}
