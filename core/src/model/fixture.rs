//! Fixture profile records, consumed by the Fader/Patch layer to derive display labels
//! and colors. The pipeline never reads channel *roles*; only the Patch binding's
//! `(universe, start_channel)` matters for output.

use serde::{Deserialize, Serialize};

/// The function a single channel offset within a fixture performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRole {
    Dimmer,
    Red,
    Green,
    Blue,
    White,
    Amber,
    Uv,
    Pan,
    PanFine,
    Tilt,
    TiltFine,
    Gobo,
    Shutter,
    Generic,
}

/// One offset within a fixture's channel footprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureChannel {
    /// Zero-based offset from the patch's start channel.
    pub offset: u16,
    pub role: ChannelRole,
    pub label: String,
}

/// A fixture profile: a reusable description of a device's channel layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub id: u64,
    pub name: String,
    pub channels: Vec<FixtureChannel>,
}

impl Fixture {
    /// Total channel footprint, i.e. one past the highest offset used.
    pub fn channel_count(&self) -> u16 {
        self.channels.iter().map(|c| c.offset + 1).max().unwrap_or(0)
    }

    /// Resolves the role at a given zero-based offset, if any channel claims it.
    pub fn role_at(&self, offset: u16) -> Option<ChannelRole> {
        self.channels
            .iter()
            .find(|c| c.offset == offset)
            .map(|c| c.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fixture() -> Fixture {
        Fixture {
            id: 1,
            name: "RGB Par".into(),
            channels: vec![
                FixtureChannel {
                    offset: 0,
                    role: ChannelRole::Dimmer,
                    label: "Dim".into(),
                },
                FixtureChannel {
                    offset: 1,
                    role: ChannelRole::Red,
                    label: "R".into(),
                },
                FixtureChannel {
                    offset: 2,
                    role: ChannelRole::Green,
                    label: "G".into(),
                },
                FixtureChannel {
                    offset: 3,
                    role: ChannelRole::Blue,
                    label: "B".into(),
                },
            ],
        }
    }

    #[test]
    fn channel_count_is_one_past_the_highest_offset() {
        assert_eq!(sample_fixture().channel_count(), 4);
    }

    #[test]
    fn role_at_resolves_known_offsets() {
        let fixture = sample_fixture();
        assert_eq!(fixture.role_at(1), Some(ChannelRole::Red));
        assert_eq!(fixture.role_at(99), None);
    }
}
