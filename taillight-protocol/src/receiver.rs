//! Streaming frame receiver
//!
//! Bytes from the UART are pushed in as they arrive, each stamped with the
//! microsecond clock. The receiver keeps the partial frame, drops it when the
//! line goes quiet mid-frame, and hands out decoded packets one at a time.

use heapless::Vec;

use crate::frame::{parse, FrameError, Packet, MAX_FRAME_SIZE, SYNC_BYTE};

/// Gap after which a partial frame is considered stale (µs)
pub const STALE_FRAME_US: u32 = 100;

/// Room for one full frame plus the start of the next
const BUFFER_SIZE: usize = MAX_FRAME_SIZE * 2;

/// Buffers received bytes and splits them into frames
#[derive(Debug, Clone)]
pub struct FrameReceiver {
    buffer: Vec<u8, BUFFER_SIZE>,
    last_byte_us: Option<u32>,
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReceiver {
    /// Create an empty receiver
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            last_byte_us: None,
        }
    }

    /// Discard everything buffered
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last_byte_us = None;
    }

    /// Number of bytes waiting to be decoded
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Push one received byte
    pub fn push(&mut self, byte: u8, now_us: u32) {
        self.expire(now_us);
        if self.buffer.is_full() {
            // Overrun: no frame can be this long, start over
            self.buffer.clear();
        }
        // Cannot fail after the check above
        let _ = self.buffer.push(byte);
        self.last_byte_us = Some(now_us);
    }

    /// Push a run of bytes received at the same instant
    pub fn extend(&mut self, bytes: &[u8], now_us: u32) {
        for &byte in bytes {
            self.push(byte, now_us);
        }
    }

    /// Drop a partial frame if no byte has arrived for [`STALE_FRAME_US`]
    ///
    /// Returns true if bytes were discarded.
    pub fn expire(&mut self, now_us: u32) -> bool {
        let Some(last) = self.last_byte_us else {
            return false;
        };
        if now_us.wrapping_sub(last) <= STALE_FRAME_US || self.buffer.is_empty() {
            return false;
        }
        self.buffer.clear();
        self.last_byte_us = None;
        true
    }

    /// Decode the next complete frame in the buffer
    ///
    /// Returns `None` while more bytes are needed. A decode failure drops the
    /// whole buffer; decoding resumes at the next sync byte received.
    pub fn next_packet(&mut self) -> Option<Result<Packet, FrameError>> {
        self.skip_to_sync();
        if self.buffer.is_empty() {
            return None;
        }

        match parse(&self.buffer) {
            Ok((packet, length)) => {
                self.consume(length);
                Some(Ok(packet))
            }
            Err(e) if e.needs_more_bytes() => None,
            Err(e) => {
                self.buffer.clear();
                Some(Err(e))
            }
        }
    }

    fn skip_to_sync(&mut self) {
        let start = self
            .buffer
            .iter()
            .position(|&b| b == SYNC_BYTE)
            .unwrap_or(self.buffer.len());
        self.consume(start);
    }

    fn consume(&mut self, count: usize) {
        let count = count.min(self.buffer.len());
        if count == 0 {
            return;
        }
        let remaining = self.buffer.len() - count;
        self.buffer.copy_within(count.., 0);
        self.buffer.truncate(remaining);
    }
}
