//! Pulse-width receiver input
//!
//! Each input line carries one channel; the pulse width (1000-2000 µs) is
//! the channel value. Widths outside the noise window are dropped. Samples
//! captured during one poll are gathered into a single channel map, so the
//! rest of the controller sees the same shape of data as from a serial
//! receiver.

use taillight_protocol::ChannelMap;

/// Shortest accepted pulse (exclusive, µs)
pub const MIN_PULSE_US: u32 = 700;

/// Longest accepted pulse (exclusive, µs)
pub const MAX_PULSE_US: u32 = 2300;

/// Gathers pulse measurements into channel maps
#[derive(Debug, Clone, Default)]
pub struct PulseInput {
    pending: ChannelMap,
}

impl PulseInput {
    pub const fn new() -> Self {
        Self {
            pending: ChannelMap::new(),
        }
    }

    /// Check a pulse width against the noise window
    pub fn accepts(width_us: u32) -> bool {
        width_us > MIN_PULSE_US && width_us < MAX_PULSE_US
    }

    /// Record a pulse measured on `line` (line 0 is channel 1)
    ///
    /// Returns false if the pulse was rejected as noise.
    pub fn record(&mut self, line: usize, width_us: u32) -> bool {
        if !Self::accepts(width_us) || line >= taillight_protocol::MAX_CHANNELS {
            return false;
        }
        self.pending.insert(line as u8 + 1, width_us as u16)
    }

    /// Take the samples gathered since the last call, if any
    pub fn take(&mut self) -> Option<ChannelMap> {
        if self.pending.is_empty() {
            return None;
        }
        Some(core::mem::take(&mut self.pending))
    }
}
