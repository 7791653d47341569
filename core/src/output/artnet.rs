//! Art-Net output encoding: the write-side mirror of [`crate::input::artnet`].

use crate::protocol_constants::{ARTNET_HEADER, ARTNET_OP_DMX, ARTNET_PROTOCOL_VERSION};

/// Encodes one universe's 512 channel values as an ArtDmx packet.
///
/// `net`/`subnet`/`universe` pack into the standard 15-bit Port-Address
/// (`SubUni = subnet<<4 | universe`, `Net = net & 0x7F`); `sequence` is transmitted as-is
/// (0 disables sequencing per the Art-Net spec, the caller is responsible for cycling
/// 1..=255 otherwise).
pub fn encode_artnet_dmx(net: u8, subnet: u8, universe: u8, sequence: u8, data: &[u8; 512]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(18 + 512);
    packet.extend_from_slice(ARTNET_HEADER);
    packet.extend_from_slice(&ARTNET_OP_DMX.to_le_bytes());
    packet.extend_from_slice(&ARTNET_PROTOCOL_VERSION.to_be_bytes());
    packet.push(sequence);
    packet.push(0); // physical port, unused
    let sub_uni = ((subnet & 0x0F) << 4) | (universe & 0x0F);
    packet.push(sub_uni);
    packet.push(net & 0x7F);
    packet.extend_from_slice(&512u16.to_be_bytes());
    packet.extend_from_slice(data);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::artnet::parse_artnet_dmx;

    #[test]
    fn encoded_packet_round_trips_through_the_input_parser() {
        let mut data = [0u8; 512];
        data[0] = 200;
        data[511] = 42;
        let packet = encode_artnet_dmx(1, 2, 3, 7, &data);
        let parsed = parse_artnet_dmx(&packet).unwrap();
        assert_eq!(parsed.net, 1);
        assert_eq!(parsed.subnet, 2);
        assert_eq!(parsed.universe, 3);
        assert_eq!(parsed.sequence, 7);
        assert_eq!(parsed.data[0], 200);
        assert_eq!(parsed.data[511], 42);
    }

    #[test]
    fn length_field_is_always_512() {
        let packet = encode_artnet_dmx(0, 0, 0, 0, &[0u8; 512]);
        assert_eq!(u16::from_be_bytes([packet[16], packet[17]]), 512);
    }
}
