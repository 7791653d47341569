//! Channel Mapper (§4.C): purely functional over an input frame and the active mapping
//! table.

use crate::input::InputFrame;
use crate::model::mapping::{MapDestination, MappingTable, UnmappedBehavior};

/// One resolved write produced by the mapper, destined for the Fader/Patch layer's
/// input-merged layer or a virtual target (global/universe master).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapWrite {
    pub dst: MapDestination,
    pub value: u8,
}

/// Maps `frame` through `table` (the single active mapping table, if any), producing the
/// list of writes to apply. A `None` table or a disabled one passes every channel
/// through unchanged, matching "mapping is disabled" in §4.C.
pub fn map_frame(frame: &InputFrame, table: Option<&MappingTable>) -> Vec<MapWrite> {
    let mut writes = Vec::with_capacity(frame.values.len());

    let active_table = table.filter(|t| t.enabled);

    for (offset, &value) in frame.values.iter().enumerate() {
        let channel = frame.channel_start + offset as u16;

        let Some(table) = active_table else {
            writes.push(MapWrite {
                dst: MapDestination::Channel {
                    universe_id: frame.universe_id,
                    channel,
                },
                value,
            });
            continue;
        };

        let matching: Vec<_> = table
            .rules
            .iter()
            .filter(|r| r.src_universe == frame.universe_id && r.src_channel == channel)
            .collect();

        if matching.is_empty() {
            match table.unmapped_behavior {
                UnmappedBehavior::Passthrough => writes.push(MapWrite {
                    dst: MapDestination::Channel {
                        universe_id: frame.universe_id,
                        channel,
                    },
                    value,
                }),
                UnmappedBehavior::Ignore => {}
            }
            continue;
        }

        for rule in matching {
            writes.push(MapWrite {
                dst: rule.dst,
                value,
            });
        }
    }

    writes
}
