//! Group Engine (§4.E): master -> member propagation.
//!
//! Two passes per tick:
//! 1. [`resolve_master_values`] walks the group dependency graph (already validated
//!    acyclic at configuration load, per [`crate::model::group::check_acyclic`]) so a
//!    group driving another group's master is resolved before that target propagates to
//!    its own members.
//! 2. [`apply_groups`] propagates each group's resolved master value to its members
//!    according to its [`GroupMode`].

use std::collections::HashMap;

use crate::model::group::{Group, GroupMember, GroupMode};

/// Resolves each enabled group's effective master value for this tick.
///
/// `explicit` holds the master value already known for every group before cross-group
/// propagation: either a client-issued `group_value_changed` write, or the current
/// value read from the group's `master_location` channel. Groups are then visited in
/// dependency order; a driving group's resolved value overwrites the target's explicit
/// value (last-writer-wins if more than one group drives the same target).
pub fn resolve_master_values(groups: &[Group], explicit: &HashMap<u64, u8>) -> HashMap<u64, u8> {
    let mut resolved: HashMap<u64, u8> = groups
        .iter()
        .map(|g| (g.id, explicit.get(&g.id).copied().unwrap_or(g.master_value)))
        .collect();

    let order = topological_order(groups);
    for group_id in order {
        let Some(group) = groups.iter().find(|g| g.id == group_id) else {
            continue;
        };
        if !group.enabled {
            continue;
        }
        let source_value = resolved.get(&group.id).copied().unwrap_or(0);
        for member in &group.members {
            if let GroupMember::Group { group_id: target } = member {
                resolved.insert(*target, source_value);
            }
        }
    }
    resolved
}

/// DFS postorder over the "drives" edges, reversed so a driver is visited before its
/// targets. Assumes the graph is acyclic (enforced at configuration load).
fn topological_order(groups: &[Group]) -> Vec<u64> {
    let mut visited = std::collections::HashSet::new();
    let mut order = Vec::new();

    fn visit(
        group: &Group,
        groups: &[Group],
        visited: &mut std::collections::HashSet<u64>,
        order: &mut Vec<u64>,
    ) {
        if !visited.insert(group.id) {
            return;
        }
        order.push(group.id);
        for member in &group.members {
            if let GroupMember::Group { group_id } = member {
                if let Some(target) = groups.iter().find(|g| g.id == *group_id) {
                    visit(target, groups, visited, order);
                }
            }
        }
    }

    for group in groups {
        visit(group, groups, &mut visited, &mut order);
    }
    order
}

/// State carried across ticks to detect whether a `master_latches` group's master is
/// "actively changing" (§4.E).
#[derive(Debug, Clone, Default)]
pub struct LatchTracker {
    previous_master_values: HashMap<u64, u8>,
}

impl LatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records this tick's resolved master values for comparison next tick. Must be
    /// called once per tick, after [`apply_groups`].
    pub fn commit(&mut self, resolved: &HashMap<u64, u8>) {
        self.previous_master_values = resolved.clone();
    }

    fn was_changing(&self, group_id: u64, current: u8) -> bool {
        self.previous_master_values
            .get(&group_id)
            .map(|&prev| prev != current)
            .unwrap_or(true)
    }
}

/// Resolved effects of one tick's group propagation, to be merged into the pipeline
/// before the Modifier Layer runs.
#[derive(Debug, Clone, Default)]
pub struct GroupEffects {
    /// `(universe_id, channel) -> effective value`, overriding the operator layer for
    /// members in `master_scales`/`master_sets` mode, or a currently-changing
    /// `master_latches` member.
    pub channel_overrides: HashMap<(u32, u16), u8>,
    pub global_master_override: Option<u8>,
    pub universe_master_overrides: HashMap<u32, u8>,
}

/// Applies each enabled group's resolved master value to its members.
pub fn apply_groups(
    groups: &[Group],
    resolved_master_values: &HashMap<u64, u8>,
    latch_tracker: &LatchTracker,
    operator_layer: impl Fn(u32, u16) -> u8,
) -> GroupEffects {
    let mut effects = GroupEffects::default();

    for group in groups.iter().filter(|g| g.enabled) {
        let master = resolved_master_values.get(&group.id).copied().unwrap_or(0);

        for member in &group.members {
            match member {
                GroupMember::Channel { universe_id, channel } => {
                    let operator_value = operator_layer(*universe_id, *channel);
                    let value = match group.mode {
                        GroupMode::MasterScales => {
                            Some(scale_u8(operator_value, master))
                        }
                        GroupMode::MasterSets => Some(master),
                        GroupMode::MasterLatches => {
                            if latch_tracker.was_changing(group.id, master) {
                                Some(master)
                            } else {
                                None
                            }
                        }
                    };
                    if let Some(value) = value {
                        effects
                            .channel_overrides
                            .insert((*universe_id, *channel), value);
                    }
                }
                GroupMember::GlobalMaster => {
                    effects.global_master_override = Some(master);
                }
                GroupMember::UniverseMaster { universe_id } => {
                    effects.universe_master_overrides.insert(*universe_id, master);
                }
                GroupMember::Group { .. } => {
                    // Already folded into `resolved_master_values` by `resolve_master_values`.
                }
            }
        }
    }

    effects
}

/// `round(value * master / 255)` computed in 16-bit, matching the grandmaster scaler's
/// precision contract (§3).
fn scale_u8(value: u8, master: u8) -> u8 {
    let scaled = (u16::from(value) * u16::from(master) + 127) / 255;
    scaled.min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::group::MasterLocation;

    fn group(id: u64, mode: GroupMode, members: Vec<GroupMember>) -> Group {
        Group {
            id,
            name: format!("g{id}"),
            mode,
            enabled: true,
            color: None,
            master_location: MasterLocation::None,
            master_value: 0,
            members,
            grid_id: 1,
        }
    }

    #[test]
    fn master_scales_scales_operator_value_by_master_over_255() {
        let groups = vec![group(
            1,
            GroupMode::MasterScales,
            vec![GroupMember::Channel { universe_id: 1, channel: 1 }],
        )];
        let resolved = HashMap::from([(1, 64)]);
        let tracker = LatchTracker::new();
        let effects = apply_groups(&groups, &resolved, &tracker, |_, _| 200);
        // round(200 * 64 / 255) = 50, matching end-to-end scenario 4.
        assert_eq!(effects.channel_overrides[&(1, 1)], 50);
    }

    #[test]
    fn master_sets_overwrites_operator_value_outright() {
        let groups = vec![group(
            1,
            GroupMode::MasterSets,
            vec![GroupMember::Channel { universe_id: 1, channel: 1 }],
        )];
        let resolved = HashMap::from([(1, 90)]);
        let tracker = LatchTracker::new();
        let effects = apply_groups(&groups, &resolved, &tracker, |_, _| 10);
        assert_eq!(effects.channel_overrides[&(1, 1)], 90);
    }

    #[test]
    fn master_latches_follows_while_changing_and_releases_once_stable() {
        let groups = vec![group(
            1,
            GroupMode::MasterLatches,
            vec![GroupMember::Channel { universe_id: 1, channel: 1 }],
        )];
        let mut tracker = LatchTracker::new();

        let resolved_changing = HashMap::from([(1, 50)]);
        let effects = apply_groups(&groups, &resolved_changing, &tracker, |_, _| 0);
        assert_eq!(effects.channel_overrides[&(1, 1)], 50);
        tracker.commit(&resolved_changing);

        // Same master value next tick: no longer "actively changing".
        let resolved_stable = HashMap::from([(1, 50)]);
        let effects = apply_groups(&groups, &resolved_stable, &tracker, |_, _| 0);
        assert!(effects.channel_overrides.get(&(1, 1)).is_none());
    }

    #[test]
    fn virtual_targets_route_to_grandmaster_inputs() {
        let groups = vec![group(1, GroupMode::MasterSets, vec![GroupMember::GlobalMaster])];
        let resolved = HashMap::from([(1, 200)]);
        let tracker = LatchTracker::new();
        let effects = apply_groups(&groups, &resolved, &tracker, |_, _| 0);
        assert_eq!(effects.global_master_override, Some(200));
    }

    #[test]
    fn a_group_driving_another_groups_master_propagates_before_it_fans_out() {
        let groups = vec![
            group(1, GroupMode::MasterSets, vec![GroupMember::Group { group_id: 2 }]),
            group(2, GroupMode::MasterSets, vec![GroupMember::Channel { universe_id: 1, channel: 1 }]),
        ];
        let explicit = HashMap::from([(1, 77)]);
        let resolved = resolve_master_values(&groups, &explicit);
        assert_eq!(resolved[&2], 77);
    }
}
