//! sACN (E1.31) output encoding: the write-side mirror of [`crate::input::sacn`].
//!
//! Offsets match [`crate::input::sacn`]'s `offsets` module exactly, so a packet this
//! module produces parses back through [`crate::input::sacn::parse_sacn_data`] unchanged.

use crate::protocol_constants::{
    ACN_PACKET_IDENTIFIER, E131_DMP_VECTOR, E131_FRAMING_VECTOR, E131_ROOT_VECTOR,
};

const TOTAL_LEN: usize = 126 + 512;

/// Encodes one universe's 512 channel values as an E1.31 data packet.
///
/// `cid` is the 16-byte component identifier persisted per universe; `source_name` is
/// truncated/padded to the 64-byte framing-layer field.
pub fn encode_sacn_data(
    cid: &[u8; 16],
    source_name: &str,
    universe: u16,
    priority: u8,
    sequence: u8,
    data: &[u8; 512],
) -> Vec<u8> {
    let mut packet = vec![0u8; TOTAL_LEN];

    packet[0..2].copy_from_slice(&0x0010u16.to_be_bytes());
    packet[2..4].copy_from_slice(&0x0000u16.to_be_bytes());
    packet[4..16].copy_from_slice(ACN_PACKET_IDENTIFIER);

    let root_length = (TOTAL_LEN - 16) as u16;
    packet[16..18].copy_from_slice(&(0x7000 | root_length).to_be_bytes());
    packet[18..22].copy_from_slice(&E131_ROOT_VECTOR.to_be_bytes());
    packet[22..38].copy_from_slice(cid);

    let framing_length = (TOTAL_LEN - 38) as u16;
    packet[38..40].copy_from_slice(&(0x7000 | framing_length).to_be_bytes());
    packet[40..44].copy_from_slice(&E131_FRAMING_VECTOR.to_be_bytes());
    let name_bytes = source_name.as_bytes();
    let copy_len = name_bytes.len().min(63);
    packet[44..44 + copy_len].copy_from_slice(&name_bytes[..copy_len]);
    packet[108] = priority;
    // packet[109..111] sync address left at 0: synchronization is not implemented.
    packet[111] = sequence;
    // packet[112] options byte left at 0: stream-terminated/preview flags unused.
    packet[113..115].copy_from_slice(&universe.to_be_bytes());

    let dmp_length = (TOTAL_LEN - 115) as u16;
    packet[115..117].copy_from_slice(&(0x7000 | dmp_length).to_be_bytes());
    packet[117] = E131_DMP_VECTOR;
    packet[118] = 0xA1; // address type & data type
    packet[119..121].copy_from_slice(&0u16.to_be_bytes()); // first property address
    packet[121..123].copy_from_slice(&1u16.to_be_bytes()); // address increment
    packet[123..125].copy_from_slice(&513u16.to_be_bytes()); // property value count
    packet[125] = 0; // DMX start code
    packet[126..126 + 512].copy_from_slice(data);

    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::sacn::parse_sacn_data;

    #[test]
    fn encoded_packet_round_trips_through_the_input_parser() {
        let mut data = [0u8; 512];
        data[0] = 128;
        let cid = [7u8; 16];
        let packet = encode_sacn_data(&cid, "dmxx", 5, 100, 10, &data);
        let parsed = parse_sacn_data(&packet).unwrap();
        assert_eq!(parsed.universe, 5);
        assert_eq!(parsed.priority, 100);
        assert_eq!(parsed.sequence, 10);
        assert_eq!(parsed.data[0], 128);
    }

    #[test]
    fn packet_length_matches_the_fixed_e131_data_packet_size() {
        let packet = encode_sacn_data(&[0u8; 16], "", 1, 100, 0, &[0u8; 512]);
        assert_eq!(packet.len(), TOTAL_LEN);
    }
}
