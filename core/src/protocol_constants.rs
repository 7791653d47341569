//! Wire-level constants for the Art-Net and sACN (E1.31) protocols.

/// Art-Net UDP port.
pub const ARTNET_PORT: u16 = 6454;

/// ASCII header identifying an Art-Net packet, including the trailing NUL.
pub const ARTNET_HEADER: &[u8; 8] = b"Art-Net\0";

/// OpCode for an ArtDmx (DMX data) packet, transmitted little-endian on the wire.
pub const ARTNET_OP_DMX: u16 = 0x5000;

/// Art-Net protocol version transmitted big-endian on the wire.
pub const ARTNET_PROTOCOL_VERSION: u16 = 0x000E;

/// Number of channels in a DMX512 universe.
pub const DMX_UNIVERSE_SIZE: usize = 512;

/// sACN (E1.31) UDP port.
pub const SACN_PORT: u16 = 5568;

/// Base of the sACN multicast range: `239.255.<hi>.<lo>`.
pub const SACN_MULTICAST_BASE: [u8; 2] = [239, 255];

/// Default sACN priority when a universe does not configure its own.
pub const SACN_DEFAULT_PRIORITY: u8 = 100;

/// Tolerance window (in sequence counts) for accepting a seemingly-out-of-order sACN
/// packet, to absorb the 255 -> 0 wraparound without a spurious drop.
pub const SACN_SEQUENCE_WRAP_TOLERANCE: u8 = 20;

/// Nominal output tick rate, matching the DMX512 refresh rate.
pub const OUTPUT_RATE_NOMINAL_HZ: u32 = 44;

/// Lowest output tick rate a deployment may configure.
pub const OUTPUT_RATE_FLOOR_HZ: u32 = 20;

/// Below this many individual channel changes in one universe per tick, the scheduler
/// emits granular `channel_change` events; at or above it, a full `values` snapshot.
pub const CHANGE_BATCH_THRESHOLD: usize = 32;

/// Bounded outbound queue depth per hub client before it is disconnected.
pub const CLIENT_QUEUE_DEPTH: usize = 256;

/// Client write deadline before the connection is dropped.
pub const CLIENT_WRITE_DEADLINE: std::time::Duration = std::time::Duration::from_secs(5);

/// Minimum tick rate for a running scene fade/crossfade.
pub const SCENE_FADE_MIN_HZ: u32 = 40;

/// Extra grace period appended to a scene transition's duration during which clients
/// are told to suppress echoing stale operator values.
pub const SCENE_GRACE_PERIOD: std::time::Duration = std::time::Duration::from_secs(1);

/// `E1.31` root layer vector (E1.31 data packet).
pub const E131_ROOT_VECTOR: u32 = 0x0000_0004;

/// `E1.31` framing layer vector (data packet).
pub const E131_FRAMING_VECTOR: u32 = 0x0000_0002;

/// `E1.31` DMP layer vector (set property).
pub const E131_DMP_VECTOR: u8 = 0x02;

/// ACN packet identifier embedded in the root layer.
pub const ACN_PACKET_IDENTIFIER: &[u8; 12] = b"ASC-E1.17\0\0\0";
