//! Output Scheduler (§4.I): encodes each universe's post-pipeline values to its
//! configured protocol and transmits over UDP, diffing against the last-broadcast frame
//! to decide between a granular `channel_change` event and a full `values` snapshot.
//!
//! Per §5 ("shares the engine task or runs pinned after the tick"), this module does not
//! run its own ticker: [`crate::engine`] calls [`OutputTransmitter::transmit`] and
//! [`diff_against_last`] once per universe at the end of every tick, inline with the rest
//! of the pipeline, so emission always sees a consistent post-tick snapshot.

pub mod artnet;
pub mod sacn;

use std::collections::HashMap;
use std::net::{SocketAddr, SocketAddrV4};

use tokio::net::UdpSocket;
use uuid::Uuid;

use crate::error::DmxxError;
use crate::events::ChannelDelta;
use crate::model::universe::{ProtocolBinding, Universe};
use crate::protocol_constants::{ARTNET_PORT, CHANGE_BATCH_THRESHOLD, SACN_PORT};

/// Result of diffing one universe's freshly-computed output against its last-broadcast
/// frame (§4.I point 4, the batching threshold).
pub enum UniverseDiff {
    Unchanged,
    Changes(Vec<ChannelDelta>),
    Snapshot(Vec<u8>),
}

/// Diffs `current` against `last`, choosing granular deltas under
/// [`CHANGE_BATCH_THRESHOLD`] changes and a full snapshot at or above it.
pub fn diff_against_last(
    last: &[u8; Universe::CHANNEL_COUNT],
    current: &[u8; Universe::CHANNEL_COUNT],
) -> UniverseDiff {
    let mut changes = Vec::new();
    for i in 0..Universe::CHANNEL_COUNT {
        if last[i] != current[i] {
            changes.push(ChannelDelta {
                channel: (i + 1) as u16,
                value: current[i],
            });
        }
    }
    if changes.is_empty() {
        UniverseDiff::Unchanged
    } else if changes.len() < CHANGE_BATCH_THRESHOLD {
        UniverseDiff::Changes(changes)
    } else {
        UniverseDiff::Snapshot(current.to_vec())
    }
}

/// Per-universe transmission bookkeeping: a cached UDP socket, the protocol sequence
/// counter, and (for sACN) the stable component identifier.
struct UniverseSender {
    socket: UdpSocket,
    sequence: u8,
    cid: Uuid,
}

/// Owns one UDP socket per output-bound universe and the sequence/CID state that must
/// persist across ticks. Send failures are counted and logged, never fatal (§4.I).
#[derive(Default)]
pub struct OutputTransmitter {
    senders: HashMap<u32, UniverseSender>,
    pub send_errors: u64,
}

impl OutputTransmitter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender_for(&mut self, universe_id: u32) -> Result<&mut UniverseSender, DmxxError> {
        if !self.senders.contains_key(&universe_id) {
            let socket = UdpSocket::bind((std::net::Ipv4Addr::UNSPECIFIED, 0))
                .await
                .map_err(|e| DmxxError::Network(format!("failed to bind output socket: {e}")))?;
            socket.set_broadcast(true).ok();
            self.senders.insert(
                universe_id,
                UniverseSender {
                    socket,
                    sequence: 0,
                    cid: Uuid::new_v4(),
                },
            );
        }
        Ok(self.senders.get_mut(&universe_id).expect("just inserted"))
    }

    /// Encodes and sends `values` per `universe.output`'s binding. A `None` binding is a
    /// no-op (the universe is operator/input only).
    pub async fn transmit(
        &mut self,
        universe: &Universe,
        values: &[u8; Universe::CHANNEL_COUNT],
    ) -> Result<(), DmxxError> {
        let Some(binding) = &universe.output else {
            return Ok(());
        };

        let sender = self.sender_for(universe.id).await?;
        sender.sequence = sender.sequence.wrapping_add(1);

        let result = match binding {
            ProtocolBinding::ArtNet { address, net, subnet, universe: wire_universe } => {
                let packet = artnet::encode_artnet_dmx(*net, *subnet, *wire_universe, sender.sequence, values);
                let dest = format!("{address}:{ARTNET_PORT}");
                send_to(&sender.socket, &dest, &packet).await
            }
            ProtocolBinding::Sacn { universe: wire_universe, priority, .. } => {
                let group = crate::input::sacn::multicast_group(*wire_universe);
                let dest = SocketAddr::from(SocketAddrV4::new(group, SACN_PORT));
                let packet = sacn::encode_sacn_data(
                    sender.cid.as_bytes(),
                    &universe.label,
                    *wire_universe,
                    *priority,
                    sender.sequence,
                    values,
                );
                sender.socket.send_to(&packet, dest).await.map(|_| ())
            }
        };

        if let Err(e) = result {
            self.send_errors += 1;
            log::warn!("[output] universe {} send failed: {e}", universe.id);
        }
        Ok(())
    }
}

async fn send_to(socket: &UdpSocket, dest: &str, packet: &[u8]) -> std::io::Result<()> {
    socket.send_to(packet, dest).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_frames_produce_no_diff() {
        let values = [10u8; Universe::CHANNEL_COUNT];
        match diff_against_last(&values, &values) {
            UniverseDiff::Unchanged => {}
            _ => panic!("expected Unchanged"),
        }
    }

    #[test]
    fn a_few_changes_stay_below_the_batching_threshold() {
        let last = [0u8; Universe::CHANNEL_COUNT];
        let mut current = last;
        current[0] = 1;
        current[1] = 2;
        match diff_against_last(&last, &current) {
            UniverseDiff::Changes(changes) => assert_eq!(changes.len(), 2),
            _ => panic!("expected Changes"),
        }
    }

    #[test]
    fn changes_at_the_threshold_emit_a_full_snapshot() {
        let last = [0u8; Universe::CHANNEL_COUNT];
        let mut current = last;
        for i in 0..CHANGE_BATCH_THRESHOLD {
            current[i] = 1;
        }
        match diff_against_last(&last, &current) {
            UniverseDiff::Snapshot(values) => assert_eq!(values.len(), Universe::CHANNEL_COUNT),
            _ => panic!("expected Snapshot at the threshold"),
        }
    }

    #[test]
    fn one_below_the_threshold_still_emits_granular_changes() {
        let last = [0u8; Universe::CHANNEL_COUNT];
        let mut current = last;
        for i in 0..(CHANGE_BATCH_THRESHOLD - 1) {
            current[i] = 1;
        }
        match diff_against_last(&last, &current) {
            UniverseDiff::Changes(changes) => assert_eq!(changes.len(), CHANGE_BATCH_THRESHOLD - 1),
            _ => panic!("expected Changes just under the threshold"),
        }
    }
}
