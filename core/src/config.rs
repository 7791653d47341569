//! Core application configuration and the configuration snapshot.
//!
//! Two distinct things live here, mirroring the ownership split in §3 of the
//! specification:
//!
//! - [`Config`]: the small set of persisted server settings (host, port, credentials,
//!   IP whitelist) that the core itself reads. This is what the standalone server's
//!   [`crate::bootstrap`] consumes.
//! - [`ConfigSnapshot`]: the much larger set of domain records (fixtures, patches,
//!   scenes, groups, grids, mapping tables, profiles) owned by the HTTP collaborator.
//!   The engine only ever holds an `Arc<ConfigSnapshot>`, atomically replaced wholesale
//!   on change — never mutated in place.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::auth::whitelist::WhitelistRule;
use crate::error::DmxxError;
use crate::model::{
    check_acyclic, check_no_overlap, check_single_enabled, Fixture, Grid, Group, MappingTable,
    Patch, Scene, Universe,
};
use crate::model::profile::AccessProfile;

/// Persisted server settings read directly by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    /// `0` means "pick any available port in the default scan range".
    pub port: u16,
    pub password: String,
    pub secret_key: String,
    pub ip_whitelist: Vec<WhitelistRule>,
    /// Nominal output tick rate in Hz; clamped to
    /// `[OUTPUT_RATE_FLOOR_HZ, OUTPUT_RATE_NOMINAL_HZ]` by the scheduler.
    pub output_rate_hz: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            password: String::new(),
            secret_key: String::new(),
            ip_whitelist: Vec::new(),
            output_rate_hz: crate::protocol_constants::OUTPUT_RATE_NOMINAL_HZ,
        }
    }
}

/// The full domain configuration, owned by the HTTP collaborator and handed to the core
/// as an immutable, atomically-swappable snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub universes: Vec<Universe>,
    pub fixtures: Vec<Fixture>,
    pub patches: Vec<Patch>,
    pub scenes: Vec<Scene>,
    pub groups: Vec<Group>,
    pub grids: Vec<Grid>,
    pub mapping_tables: Vec<MappingTable>,
    pub profiles: Vec<AccessProfile>,
}

impl ConfigSnapshot {
    /// Validates every cross-cutting invariant from §8 before a snapshot is allowed to
    /// replace the currently-active one. A configuration error here means the previous
    /// snapshot stays active and no `*_changed` event is emitted (§7).
    pub fn validate(&self) -> Result<(), DmxxError> {
        for scene in &self.scenes {
            scene.validate()?;
        }
        check_single_enabled(&self.mapping_tables)?;
        check_acyclic(&self.groups)?;

        for (i, patch) in self.patches.iter().enumerate() {
            check_no_overlap(patch, self.patches[..i].iter(), |fixture_id| {
                self.fixtures.iter().find(|f| f.id == fixture_id)
            })?;
        }

        let mut seen_universe_ids = std::collections::HashSet::new();
        for universe in &self.universes {
            if !seen_universe_ids.insert(universe.id) {
                return Err(DmxxError::Configuration(format!(
                    "duplicate universe id {}",
                    universe.id
                )));
            }
        }
        Ok(())
    }

    pub fn fixture(&self, id: u64) -> Option<&Fixture> {
        self.fixtures.iter().find(|f| f.id == id)
    }

    pub fn universe(&self, id: u32) -> Option<&Universe> {
        self.universes.iter().find(|u| u.id == id)
    }

    pub fn scene(&self, id: u64) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn group(&self, id: u64) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }
}

/// Shared handle to the currently-active snapshot, atomically swapped by the HTTP
/// collaborator off-tick (§9: "no in-place mutation").
pub type SharedSnapshot = Arc<arc_swap::ArcSwap<ConfigSnapshot>>;

/// Builds a fresh [`SharedSnapshot`] seeded with `initial`.
pub fn shared_snapshot(initial: ConfigSnapshot) -> SharedSnapshot {
    Arc::new(arc_swap::ArcSwap::new(Arc::new(initial)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 0);
        assert_eq!(config.output_rate_hz, 44);
    }

    #[test]
    fn empty_snapshot_validates() {
        assert!(ConfigSnapshot::default().validate().is_ok());
    }

    #[test]
    fn duplicate_universe_ids_are_rejected() {
        let mut snapshot = ConfigSnapshot::default();
        snapshot.universes.push(Universe {
            id: 1,
            label: "a".into(),
            input: None,
            output: None,
            passthrough_mode: Default::default(),
            master_fader_color: None,
        });
        snapshot.universes.push(Universe {
            id: 1,
            label: "b".into(),
            input: None,
            output: None,
            passthrough_mode: Default::default(),
            master_fader_color: None,
        });
        assert!(snapshot.validate().is_err());
    }
}
