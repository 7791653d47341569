//! Art-Net input receiver: listens on UDP port 6454, filters by opcode, and normalizes
//! ArtDmx packets into [`InputFrame`]s.

use std::net::SocketAddr;
use std::sync::Arc;

use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{clamp_window, InputFrame, ReceiverStats};
use crate::protocol_constants::{ARTNET_HEADER, ARTNET_OP_DMX, ARTNET_PORT};

/// A successfully parsed ArtDmx packet.
#[derive(Debug, PartialEq, Eq)]
pub struct ArtDmxPacket {
    pub net: u8,
    pub subnet: u8,
    pub universe: u8,
    pub sequence: u8,
    pub data: Vec<u8>,
}

/// Parses an ArtDmx (`OpDmx`) packet out of a raw UDP payload.
///
/// Returns `None` for anything malformed: short packet, wrong header, wrong opcode.
/// Malformed packets are dropped silently by the caller per §4.B failure semantics.
pub fn parse_artnet_dmx(packet: &[u8]) -> Option<ArtDmxPacket> {
    // Header(8) + OpCode(2) + ProtVer(2) + Sequence(1) + Physical(1) + SubUni(1) + Net(1) + Length(2)
    const MIN_LEN: usize = 18;
    if packet.len() < MIN_LEN {
        return None;
    }
    if &packet[0..8] != ARTNET_HEADER {
        return None;
    }
    let opcode = u16::from_le_bytes([packet[8], packet[9]]);
    if opcode != ARTNET_OP_DMX {
        return None;
    }
    let sequence = packet[12];
    let sub_uni = packet[14];
    let net = packet[15] & 0x7F;
    let length = u16::from_be_bytes([packet[16], packet[17]]) as usize;

    let data_start = MIN_LEN;
    if packet.len() < data_start + length {
        return None;
    }

    Some(ArtDmxPacket {
        net,
        subnet: (sub_uni >> 4) & 0x0F,
        universe: sub_uni & 0x0F,
        sequence,
        data: packet[data_start..data_start + length].to_vec(),
    })
}

/// Configuration for one Art-Net input receiver task.
pub struct ArtNetInputConfig {
    pub bind_address: SocketAddr,
    /// Maps a wire (net, subnet, universe) triple to the internal universe id.
    pub internal_universe_id: u32,
    pub channel_start: u16,
    pub channel_end: u16,
    pub source_name: String,
}

fn bind_udp_socket(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

/// Runs one Art-Net input receiver until `cancel` fires. Receive errors are logged and
/// counted (never fatal); the task keeps listening.
pub async fn run_artnet_input(
    config: ArtNetInputConfig,
    frame_tx: mpsc::Sender<InputFrame>,
    stats: Arc<ReceiverStats>,
    cancel: CancellationToken,
) {
    let socket = match bind_udp_socket(config.bind_address) {
        Ok(socket) => socket,
        Err(e) => {
            log::error!(
                "[artnet-input] failed to bind {}: {e}",
                config.bind_address
            );
            return;
        }
    };
    log::info!(
        "[artnet-input] listening on {} (port {ARTNET_PORT})",
        config.bind_address
    );

    let (start, len) = clamp_window(config.channel_start, config.channel_end);
    let mut buf = [0u8; 1024];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("[artnet-input] {} shutting down", config.bind_address);
                return;
            }
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((n, _peer)) => {
                        stats.record_received();
                        let Some(packet) = parse_artnet_dmx(&buf[..n]) else {
                            stats.record_malformed();
                            continue;
                        };
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
                            log::warn!("[artnet-input] engine queue full, dropping frame");
                        }
                    }
                    Err(e) => {
                        log::warn!("[artnet-input] recv error: {e}");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet(sequence: u8, sub_uni: u8, net: u8, data: &[u8]) -> Vec<u8> {
        let mut packet = Vec::new();
        packet.extend_from_slice(ARTNET_HEADER);
        packet.extend_from_slice(&ARTNET_OP_DMX.to_le_bytes());
        packet.extend_from_slice(&0x000Eu16.to_be_bytes());
        packet.push(sequence);
        packet.push(0); // physical
        packet.push(sub_uni);
        packet.push(net);
        packet.extend_from_slice(&(data.len() as u16).to_be_bytes());
        packet.extend_from_slice(data);
        packet
    }

    #[test]
    fn parses_a_well_formed_artdmx_packet() {
        let data = vec![200u8; 512];
        let packet = sample_packet(1, 0x12, 0x00, &data);
        let parsed = parse_artnet_dmx(&packet).unwrap();
        assert_eq!(parsed.subnet, 1);
        assert_eq!(parsed.universe, 2);
        assert_eq!(parsed.sequence, 1);
        assert_eq!(parsed.data[0], 200);
        assert_eq!(parsed.data.len(), 512);
    }

    #[test]
    fn rejects_short_packets() {
        assert!(parse_artnet_dmx(&[0u8; 4]).is_none());
    }

    #[test]
    fn rejects_wrong_header() {
        let mut packet = sample_packet(0, 0, 0, &[1, 2, 3]);
        packet[0] = b'X';
        assert!(parse_artnet_dmx(&packet).is_none());
    }

    #[test]
    fn rejects_wrong_opcode() {
        let mut packet = sample_packet(0, 0, 0, &[1, 2, 3]);
        packet[8] = 0xFF;
        assert!(parse_artnet_dmx(&packet).is_none());
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut packet = sample_packet(0, 0, 0, &[1, 2, 3]);
        packet.truncate(packet.len() - 1);
        assert!(parse_artnet_dmx(&packet).is_none());
    }
}
