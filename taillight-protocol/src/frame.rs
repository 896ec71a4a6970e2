//! Frame header handling and packet dispatch.
//!
//! Frame format:
//! - SYNC (1 byte): 0xA6 synchronization byte
//! - TYPE (1 byte): 0xCD control, 0x80 telemetry
//! - LENGTH (1 byte): total frame length, header included
//! - PAYLOAD: type-specific fields

use crate::control::ControlFrame;
use crate::telemetry::TelemetryRecord;

/// Frame synchronization byte
pub const SYNC_BYTE: u8 = 0xA6;

/// Control (channel data) frame type
pub const TYPE_CONTROL: u8 = 0xCD;

/// Telemetry frame type
pub const TYPE_TELEMETRY: u8 = 0x80;

/// SYNC + TYPE + LENGTH
pub const HEADER_SIZE: usize = 3;

/// Largest frame the link can carry
pub const MAX_FRAME_SIZE: usize = 80;

/// Errors that can occur during frame decoding or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Frame is incomplete (need more bytes)
    Incomplete,
    /// First byte is not the sync byte
    BadSync,
    /// Type byte does not name a known frame type
    UnknownType(u8),
    /// Declared length is too short for the declared fields
    Malformed,
    /// Buffer too small for encoding
    BufferTooSmall,
}

impl FrameError {
    /// Check if the caller should keep buffering rather than discard
    pub fn needs_more_bytes(&self) -> bool {
        matches!(self, FrameError::Incomplete)
    }
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Packet {
    /// Channel data from the transmitter
    Control(ControlFrame),
    /// Telemetry from a bus device
    Telemetry(TelemetryRecord),
}

/// Decode the frame at the start of `buf`
///
/// Returns the packet and the number of bytes it occupied. Trailing bytes
/// beyond the declared length are left for the caller.
pub fn parse(buf: &[u8]) -> Result<(Packet, usize), FrameError> {
    if buf.len() < HEADER_SIZE {
        if buf.first().is_some_and(|&b| b != SYNC_BYTE) {
            return Err(FrameError::BadSync);
        }
        return Err(FrameError::Incomplete);
    }

    if buf[0] != SYNC_BYTE {
        return Err(FrameError::BadSync);
    }

    let frame_type = buf[1];
    let length = buf[2] as usize;
    if !(HEADER_SIZE..=MAX_FRAME_SIZE).contains(&length) {
        return Err(FrameError::Malformed);
    }
    if buf.len() < length {
        return Err(FrameError::Incomplete);
    }

    let frame = &buf[..length];
    let packet = match frame_type {
        TYPE_CONTROL => Packet::Control(ControlFrame::decode(frame)?),
        TYPE_TELEMETRY => Packet::Telemetry(TelemetryRecord::decode(frame)?),
        other => return Err(FrameError::UnknownType(other)),
    };

    Ok((packet, length))
}

/// Write a frame header into `buf`
pub(crate) fn write_header(buf: &mut [u8], frame_type: u8, length: usize) -> Result<(), FrameError> {
    if length > MAX_FRAME_SIZE || buf.len() < length {
        return Err(FrameError::BufferTooSmall);
    }
    buf[0] = SYNC_BYTE;
    buf[1] = frame_type;
    buf[2] = length as u8;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_needs_more() {
        assert_eq!(parse(&[]), Err(FrameError::Incomplete));
        assert_eq!(parse(&[SYNC_BYTE, TYPE_CONTROL]), Err(FrameError::Incomplete));
    }

    #[test]
    fn test_bad_sync() {
        assert_eq!(parse(&[0x00]), Err(FrameError::BadSync));
        assert_eq!(parse(&[0x12, TYPE_CONTROL, 12]), Err(FrameError::BadSync));
    }

    #[test]
    fn test_unknown_type() {
        let buf = [SYNC_BYTE, 0x21, 4, 0];
        assert_eq!(parse(&buf), Err(FrameError::UnknownType(0x21)));
    }

    #[test]
    fn test_length_below_header_is_malformed() {
        let buf = [SYNC_BYTE, TYPE_CONTROL, 2, 0, 0];
        assert_eq!(parse(&buf), Err(FrameError::Malformed));
    }

    #[test]
    fn test_declared_length_waits_for_bytes() {
        // Header says 20 bytes but only 10 arrived
        let mut buf = [0u8; 10];
        buf[0] = SYNC_BYTE;
        buf[1] = TYPE_TELEMETRY;
        buf[2] = 20;
        let err = parse(&buf).unwrap_err();
        assert!(err.needs_more_bytes());
    }

    #[test]
    fn test_write_header_rejects_small_buffer() {
        let mut buf = [0u8; 4];
        assert_eq!(
            write_header(&mut buf, TYPE_CONTROL, 12),
            Err(FrameError::BufferTooSmall)
        );
    }
}
