//! Universe configuration records.

use serde::{Deserialize, Serialize};

use crate::protocol_constants::DMX_UNIVERSE_SIZE;

/// How a universe's input and output relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PassthroughMode {
    /// Input and output are independent; this is the normal pipeline behavior.
    #[default]
    Off,
    /// Operator-layer faders are written straight to output, bypassing merge with input.
    FadersOutput,
    /// Output mirrors the input-merged layer only; operator writes are ignored for output.
    OutputOnly,
}

/// Which protocol (if any) a universe's input or output is bound to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "protocol", rename_all = "snake_case")]
pub enum ProtocolBinding {
    ArtNet {
        /// Bind address for input, or destination address for output.
        address: String,
        /// Art-Net net/subnet/universe packing this binding corresponds to.
        net: u8,
        subnet: u8,
        universe: u8,
    },
    Sacn {
        address: String,
        /// E1.31 universe number (1..=63999).
        universe: u16,
        priority: u8,
    },
}

/// A DMX512 universe's static configuration.
///
/// Universes are loaded once from the configuration snapshot and live for the process
/// lifetime; only their channel arrays (held in [`crate::universe::store::UniverseStore`])
/// are mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Universe {
    pub id: u32,
    pub label: String,
    pub input: Option<ProtocolBinding>,
    pub output: Option<ProtocolBinding>,
    pub passthrough_mode: PassthroughMode,
    pub master_fader_color: Option<String>,
}

impl Universe {
    /// Number of addressable channels in any universe; always [`DMX_UNIVERSE_SIZE`].
    pub const CHANNEL_COUNT: usize = DMX_UNIVERSE_SIZE;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_mode_defaults_to_off() {
        assert_eq!(PassthroughMode::default(), PassthroughMode::Off);
    }
}
