//! Channel mapping rules and tables, consumed by the Channel Mapper (§4.C).

use serde::{Deserialize, Serialize};

use crate::error::DmxxError;

/// Destination of a mapping rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MapDestination {
    Channel { universe_id: u32, channel: u16 },
    GlobalMaster,
    UniverseMaster { universe_id: u32 },
}

/// A single source-to-destination remap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRule {
    pub src_universe: u32,
    pub src_channel: u16,
    pub dst: MapDestination,
}

/// What happens to a source channel that no rule claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedBehavior {
    Passthrough,
    Ignore,
}

/// A named, possibly-enabled set of mapping rules. At most one table may be enabled
/// across the whole configuration snapshot (Invariant 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingTable {
    pub name: String,
    pub enabled: bool,
    pub unmapped_behavior: UnmappedBehavior,
    pub rules: Vec<MappingRule>,
}

/// Validates that at most one of `tables` has `enabled = true`.
pub fn check_single_enabled(tables: &[MappingTable]) -> Result<(), DmxxError> {
    let enabled_count = tables.iter().filter(|t| t.enabled).count();
    if enabled_count > 1 {
        return Err(DmxxError::InvalidMapping(format!(
            "{} mapping tables are enabled; at most one may be",
            enabled_count
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(enabled: bool) -> MappingTable {
        MappingTable {
            name: "t".into(),
            enabled,
            unmapped_behavior: UnmappedBehavior::Passthrough,
            rules: vec![],
        }
    }

    #[test]
    fn zero_or_one_enabled_tables_is_accepted() {
        assert!(check_single_enabled(&[table(false), table(false)]).is_ok());
        assert!(check_single_enabled(&[table(true), table(false)]).is_ok());
    }

    #[test]
    fn two_enabled_tables_is_rejected() {
        assert!(check_single_enabled(&[table(true), table(true)]).is_err());
    }
}
