//! Group records and the adjacency-list cycle check run at configuration load.
//!
//! Per the re-architecture note, the member graph is stored as adjacency lists keyed by
//! integer ids and validated for acyclicity with a DFS at load time; runtime code is
//! free to assume a DAG and never needs to guard against recursion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::DmxxError;

/// How a group's master value propagates to its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    MasterScales,
    MasterSets,
    MasterLatches,
}

/// Where a group's master value is sourced from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MasterLocation {
    None,
    Channel { universe_id: u32, channel: u16 },
    Synthetic,
}

/// A member of a group: either a concrete channel or a virtual target wired straight to
/// the Grandmaster Scaler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupMember {
    Channel { universe_id: u32, channel: u16 },
    GlobalMaster,
    UniverseMaster { universe_id: u32 },
    /// Another group, driven by this one's master value.
    Group { group_id: u64 },
}

/// A named container of groups with an ordering/color hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    pub id: u64,
    pub name: String,
    pub order: u32,
    pub color: Option<String>,
}

/// A named aggregation of channels driven by a master value with a propagation mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
    pub mode: GroupMode,
    pub enabled: bool,
    pub color: Option<String>,
    pub master_location: MasterLocation,
    pub master_value: u8,
    pub members: Vec<GroupMember>,
    pub grid_id: u64,
}

/// Validates that no group's member graph contains a cycle (group A drives group B
/// drives group A). Runs a DFS per group with a recursion-stack set to catch back edges.
pub fn check_acyclic(groups: &[Group]) -> Result<(), DmxxError> {
    let mut adjacency: HashMap<u64, Vec<u64>> = HashMap::new();
    for group in groups {
        let edges = group
            .members
            .iter()
            .filter_map(|m| match m {
                GroupMember::Group { group_id } => Some(*group_id),
                _ => None,
            })
            .collect();
        adjacency.insert(group.id, edges);
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        InStack,
        Done,
    }

    let mut marks: HashMap<u64, Mark> = groups.iter().map(|g| (g.id, Mark::Unvisited)).collect();

    fn visit(
        node: u64,
        adjacency: &HashMap<u64, Vec<u64>>,
        marks: &mut HashMap<u64, Mark>,
    ) -> Result<(), DmxxError> {
        match marks.get(&node).copied().unwrap_or(Mark::Unvisited) {
            Mark::Done => return Ok(()),
            Mark::InStack => {
                return Err(DmxxError::CircularGroup(format!(
                    "group {} is part of a cycle",
                    node
                )))
            }
            Mark::Unvisited => {}
        }
        marks.insert(node, Mark::InStack);
        if let Some(edges) = adjacency.get(&node) {
            for &next in edges {
                visit(next, adjacency, marks)?;
            }
        }
        marks.insert(node, Mark::Done);
        Ok(())
    }

    for group in groups {
        visit(group.id, &adjacency, &mut marks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: u64, targets: &[GroupMember]) -> Group {
        Group {
            id,
            name: format!("g{}", id),
            mode: GroupMode::MasterScales,
            enabled: true,
            color: None,
            master_location: MasterLocation::None,
            master_value: 0,
            members: targets.to_vec(),
            grid_id: 1,
        }
    }

    #[test]
    fn acyclic_graph_is_accepted() {
        let groups = vec![
            group(1, &[GroupMember::Group { group_id: 2 }]),
            group(2, &[GroupMember::Channel { universe_id: 1, channel: 1 }]),
        ];
        assert!(check_acyclic(&groups).is_ok());
    }

    #[test]
    fn direct_cycle_is_rejected() {
        let groups = vec![
            group(1, &[GroupMember::Group { group_id: 2 }]),
            group(2, &[GroupMember::Group { group_id: 1 }]),
        ];
        assert!(check_acyclic(&groups).is_err());
    }

    #[test]
    fn self_loop_is_rejected() {
        let groups = vec![group(1, &[GroupMember::Group { group_id: 1 }])];
        assert!(check_acyclic(&groups).is_err());
    }
}
