//! Patch bindings and the overlap invariant (`no two patches may overlap channel ranges
//! in the same universe`).

use serde::{Deserialize, Serialize};

use crate::error::DmxxError;
use crate::model::fixture::Fixture;

/// A binding of a fixture profile to a starting channel within a universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    pub id: u64,
    pub fixture_id: u64,
    pub universe_id: u32,
    /// 1-indexed starting channel.
    pub start_channel: u16,
}

impl Patch {
    /// The inclusive channel range this patch occupies, given its fixture's footprint.
    pub fn channel_range(&self, fixture: &Fixture) -> (u16, u16) {
        let count = fixture.channel_count().max(1);
        (self.start_channel, self.start_channel + count - 1)
    }
}

/// Checks that `candidate` does not overlap any patch already in `existing` within the
/// same universe. Fixtures are looked up by id via `fixture_of`; a patch whose fixture
/// cannot be resolved is treated as occupying a single channel (conservative).
pub fn check_no_overlap<'a>(
    candidate: &Patch,
    existing: impl Iterator<Item = &'a Patch>,
    fixture_of: impl Fn(u64) -> Option<&'a Fixture>,
) -> Result<(), DmxxError> {
    let candidate_fixture = fixture_of(candidate.fixture_id);
    let (cand_start, cand_end) = match candidate_fixture {
        Some(f) => candidate.channel_range(f),
        None => (candidate.start_channel, candidate.start_channel),
    };

    for other in existing {
        if other.id == candidate.id || other.universe_id != candidate.universe_id {
            continue;
        }
        let (other_start, other_end) = match fixture_of(other.fixture_id) {
            Some(f) => other.channel_range(f),
            None => (other.start_channel, other.start_channel),
        };
        if cand_start <= other_end && other_start <= cand_end {
            return Err(DmxxError::OverlappingPatch(format!(
                "patch {} ({}..={}) overlaps patch {} ({}..={}) in universe {}",
                candidate.id, cand_start, cand_end, other.id, other_start, other_end,
                candidate.universe_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixture::{ChannelRole, FixtureChannel};

    fn rgb_fixture(id: u64) -> Fixture {
        Fixture {
            id,
            name: "RGB".into(),
            channels: vec![
                FixtureChannel { offset: 0, role: ChannelRole::Red, label: "R".into() },
                FixtureChannel { offset: 1, role: ChannelRole::Green, label: "G".into() },
                FixtureChannel { offset: 2, role: ChannelRole::Blue, label: "B".into() },
            ],
        }
    }

    #[test]
    fn non_overlapping_patches_in_same_universe_are_accepted() {
        let fixture = rgb_fixture(1);
        let existing = vec![Patch { id: 1, fixture_id: 1, universe_id: 1, start_channel: 1 }];
        let candidate = Patch { id: 2, fixture_id: 1, universe_id: 1, start_channel: 4 };
        let fixtures = vec![fixture];
        let result = check_no_overlap(&candidate, existing.iter(), |id| {
            fixtures.iter().find(|f| f.id == id)
        });
        assert!(result.is_ok());
    }

    #[test]
    fn overlapping_patches_in_same_universe_are_rejected() {
        let fixture = rgb_fixture(1);
        let existing = vec![Patch { id: 1, fixture_id: 1, universe_id: 1, start_channel: 1 }];
        let candidate = Patch { id: 2, fixture_id: 1, universe_id: 1, start_channel: 3 };
        let fixtures = vec![fixture];
        let result = check_no_overlap(&candidate, existing.iter(), |id| {
            fixtures.iter().find(|f| f.id == id)
        });
        assert!(result.is_err());
    }

    #[test]
    fn overlapping_patches_in_different_universes_are_accepted() {
        let fixture = rgb_fixture(1);
        let existing = vec![Patch { id: 1, fixture_id: 1, universe_id: 1, start_channel: 1 }];
        let candidate = Patch { id: 2, fixture_id: 1, universe_id: 2, start_channel: 1 };
        let fixtures = vec![fixture];
        let result = check_no_overlap(&candidate, existing.iter(), |id| {
            fixtures.iter().find(|f| f.id == id)
        });
        assert!(result.is_ok());
    }
}
