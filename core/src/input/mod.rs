//! Input Receivers (§4.B): one task per configured input, parsing Art-Net/sACN
//! datagrams into normalized frames for the Channel Mapper.

pub mod artnet;
pub mod sacn;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A normalized frame handed from a receiver task to the Channel Mapper.
#[derive(Debug, Clone)]
pub struct InputFrame {
    pub universe_id: u32,
    /// Windowed channel values; `values[0]` corresponds to `channel_start`.
    pub values: Vec<u8>,
    pub channel_start: u16,
    pub source_name: String,
}

/// Receive-error counters for one input receiver, exposed read-only to the engine's
/// status snapshot (§10.6). Receive errors are never fatal (§4.B failure semantics).
#[derive(Default)]
pub struct ReceiverStats {
    pub packets_received: AtomicU64,
    pub packets_malformed: AtomicU64,
}

impl ReceiverStats {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.packets_malformed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Clamps a raw (start, end) channel window (1-indexed, inclusive) to the valid
/// 1..=512 range and returns it as a zero-based `(start_offset, len)` pair.
pub fn clamp_window(channel_start: u16, channel_end: u16) -> (u16, u16) {
    let start = channel_start.max(1);
    let end = channel_end.min(512).max(start);
    (start, end - start + 1)
}
