//! sACN (E1.31) input receiver: listens on multicast `239.255.<hi>.<lo>` per universe,
//! parses the three-layer PDU, and enforces the sequence-wraparound tolerance.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{clamp_window, InputFrame, ReceiverStats};
use crate::protocol_constants::{
    ACN_PACKET_IDENTIFIER, E131_DMP_VECTOR, E131_FRAMING_VECTOR, E131_ROOT_VECTOR,
    SACN_MULTICAST_BASE, SACN_PORT, SACN_SEQUENCE_WRAP_TOLERANCE,
};

/// Fixed offsets into an E1.31 data packet, per the ACN root/framing/DMP layering.
mod offsets {
    pub const ACN_IDENTIFIER: usize = 4;
    pub const ROOT_VECTOR: usize = 18;
    pub const FRAMING_VECTOR: usize = 40;
    pub const PRIORITY: usize = 108;
    pub const SEQUENCE: usize = 111;
    pub const UNIVERSE: usize = 113;
    pub const DMP_VECTOR: usize = 117;
    pub const PROPERTY_VALUES: usize = 125;
    /// Index 0 of the property values block is the DMX start code; channel data follows.
    pub const DMX_DATA: usize = PROPERTY_VALUES + 1;
    pub const MIN_PACKET_LEN: usize = DMX_DATA + 512;
}

/// A successfully parsed sACN data packet.
#[derive(Debug, PartialEq, Eq)]
pub struct SacnDataPacket {
    pub universe: u16,
    pub priority: u8,
    pub sequence: u8,
    pub data: Vec<u8>,
}

/// Parses an E1.31 data packet. Returns `None` for anything malformed: short packet,
/// wrong ACN identifier, wrong root/framing/DMP vectors.
pub fn parse_sacn_data(packet: &[u8]) -> Option<SacnDataPacket> {
    if packet.len() < offsets::MIN_PACKET_LEN {
        return None;
    }
    if &packet[offsets::ACN_IDENTIFIER..offsets::ACN_IDENTIFIER + 12] != ACN_PACKET_IDENTIFIER {
        return None;
    }
    let root_vector = u32::from_be_bytes(packet[offsets::ROOT_VECTOR..offsets::ROOT_VECTOR + 4].try_into().ok()?);
    if root_vector != E131_ROOT_VECTOR {
        return None;
    }
    let framing_vector = u32::from_be_bytes(
        packet[offsets::FRAMING_VECTOR..offsets::FRAMING_VECTOR + 4].try_into().ok()?,
    );
    if framing_vector != E131_FRAMING_VECTOR {
        return None;
    }
    if packet[offsets::DMP_VECTOR] != E131_DMP_VECTOR {
        return None;
    }

    let priority = packet[offsets::PRIORITY];
    let sequence = packet[offsets::SEQUENCE];
    let universe = u16::from_be_bytes(packet[offsets::UNIVERSE..offsets::UNIVERSE + 2].try_into().ok()?);
    let data = packet[offsets::DMX_DATA..offsets::DMX_DATA + 512].to_vec();

    Some(SacnDataPacket {
        universe,
        priority,
        sequence,
        data,
    })
}

/// Returns `true` if `candidate` is newer-or-equal to `last`, modulo 256.
///
/// The comparison treats `candidate.wrapping_sub(last)` as a signed 8-bit delta: zero or
/// positive means `candidate` is at or ahead of `last` (including a legitimate 255 -> 0
/// rollover, which wraps to a small positive delta). A negative delta means `candidate`
/// is behind; it is still accepted if the gap is within
/// [`SACN_SEQUENCE_WRAP_TOLERANCE`], so minor reordering doesn't cause a drop, but a
/// genuinely stale/duplicate packet beyond that tolerance is rejected.
pub fn sequence_is_acceptable(candidate: u8, last: u8) -> bool {
    let delta = candidate.wrapping_sub(last) as i8;
    delta > -(SACN_SEQUENCE_WRAP_TOLERANCE as i8)
}

/// The multicast group address for a given E1.31 universe number.
pub fn multicast_group(universe: u16) -> Ipv4Addr {
    let [hi, lo] = universe.to_be_bytes();
    Ipv4Addr::new(SACN_MULTICAST_BASE[0], SACN_MULTICAST_BASE[1], hi, lo)
}

/// Configuration for one sACN input receiver task (one multicast group per universe).
pub struct SacnInputConfig {
    pub universe: u16,
    pub internal_universe_id: u32,
    pub channel_start: u16,
    pub channel_end: u16,
    pub source_name: String,
}

fn bind_multicast_socket(universe: u16) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, SACN_PORT);
    socket.bind(&bind_addr.into())?;
    socket.join_multicast_v4(&multicast_group(universe), &Ipv4Addr::UNSPECIFIED)?;
    UdpSocket::from_std(socket.into())
}

/// Runs one sACN input receiver until `cancel` fires. Out-of-sequence packets are
/// dropped (counted as malformed); receive errors are logged and never fatal.
pub async fn run_sacn_input(
    config: SacnInputConfig,
    frame_tx: mpsc::Sender<InputFrame>,
    stats: Arc<ReceiverStats>,
    cancel: CancellationToken,
) {
    let socket = match bind_multicast_socket(config.universe) {
        Ok(socket) => socket,
        Err(e) => {
            log::error!(
                "[sacn-input] failed to join multicast group for universe {}: {e}",
                config.universe
            );
            return;
        }
    };
    log::info!(
        "[sacn-input] listening on {} (universe {})",
        multicast_group(config.universe),
        config.universe
    );

    let (start, len) = clamp_window(config.channel_start, config.channel_end);
    let last_sequence = AtomicU8::new(0);
    let mut seen_first = false;
    let mut buf = [0u8; 1144];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("[sacn-input] universe {} shutting down", config.universe);
                return;
            }
            result = socket_recv(&socket, &mut buf) => {
                match result {
                    Ok(n) => {
                        stats.record_received();
                        let Some(packet) = parse_sacn_data(&buf[..n]) else {
                            stats.record_malformed();
                            continue;
                        };
                        if packet.universe != config.universe {
                            continue;
                        }
                        let last = last_sequence.load(Ordering::Relaxed);
                        if seen_first && !sequence_is_acceptable(packet.sequence, last) {
                            stats.record_malformed();
                            continue;
                        }
                        last_sequence.store(packet.sequence, Ordering::Relaxed);
                        seen_first = true;

                        let window_start = (start - 1) as usize;
                        let window_end = (window_start + len as usize).min(packet.data.len());
                        if window_start >= packet.data.len() {
                            continue;
                        }
                        let values = packet.data[window_start..window_end].to_vec();
                        let frame = InputFrame {
                            universe_id: config.internal_universe_id,
                            values,
                            channel_start: start,
                            source_name: config.source_name.clone(),
                        };
                        if frame_tx.try_send(frame).is_err() {
                            log::warn!("[sacn-input] engine queue full, dropping frame");
                        }
                    }
                    Err(e) => {
                        log::warn!("[sacn-input] recv error: {e}");
                    }
                }
            }
        }
    }
}

async fn socket_recv(socket: &UdpSocket, buf: &mut [u8]) -> std::io::Result<usize> {
    let (n, _peer): (usize, SocketAddr) = socket.recv_from(buf).await?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet(universe: u16, sequence: u8, priority: u8, data: &[u8; 512]) -> Vec<u8> {
        let mut packet = vec![0u8; offsets::MIN_PACKET_LEN];
        packet[offsets::ACN_IDENTIFIER..offsets::ACN_IDENTIFIER + 12]
            .copy_from_slice(ACN_PACKET_IDENTIFIER);
        packet[offsets::ROOT_VECTOR..offsets::ROOT_VECTOR + 4]
            .copy_from_slice(&E131_ROOT_VECTOR.to_be_bytes());
        packet[offsets::FRAMING_VECTOR..offsets::FRAMING_VECTOR + 4]
            .copy_from_slice(&E131_FRAMING_VECTOR.to_be_bytes());
        packet[offsets::PRIORITY] = priority;
        packet[offsets::SEQUENCE] = sequence;
        packet[offsets::UNIVERSE..offsets::UNIVERSE + 2].copy_from_slice(&universe.to_be_bytes());
        packet[offsets::DMP_VECTOR] = E131_DMP_VECTOR;
        packet[offsets::DMX_DATA..offsets::DMX_DATA + 512].copy_from_slice(data);
        packet
    }

    #[test]
    fn parses_a_well_formed_data_packet() {
        let data = [128u8; 512];
        let packet = sample_packet(5, 10, 100, &data);
        let parsed = parse_sacn_data(&packet).unwrap();
        assert_eq!(parsed.universe, 5);
        assert_eq!(parsed.sequence, 10);
        assert_eq!(parsed.priority, 100);
        assert_eq!(parsed.data[0], 128);
    }

    #[test]
    fn rejects_short_packets() {
        assert!(parse_sacn_data(&[0u8; 10]).is_none());
    }

    #[test]
    fn rejects_wrong_acn_identifier() {
        let mut packet = sample_packet(1, 0, 100, &[0u8; 512]);
        packet[offsets::ACN_IDENTIFIER] = b'X';
        assert!(parse_sacn_data(&packet).is_none());
    }

    #[test]
    fn multicast_group_packs_universe_into_last_two_octets() {
        assert_eq!(multicast_group(1), Ipv4Addr::new(239, 255, 0, 1));
        assert_eq!(multicast_group(513), Ipv4Addr::new(239, 255, 2, 1));
    }

    #[test]
    fn normal_forward_sequence_is_accepted() {
        assert!(sequence_is_acceptable(11, 10));
    }

    #[test]
    fn equal_sequence_is_accepted() {
        assert!(sequence_is_acceptable(10, 10));
    }

    #[test]
    fn wraparound_from_255_to_0_is_accepted() {
        assert!(sequence_is_acceptable(0, 255));
    }

    #[test]
    fn a_stale_packet_well_behind_the_tolerance_is_rejected() {
        assert!(!sequence_is_acceptable(150, 200));
    }

    #[test]
    fn a_packet_slightly_behind_within_tolerance_is_accepted() {
        assert!(sequence_is_acceptable(195, 200));
    }
}
