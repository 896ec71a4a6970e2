//! Control frames: channel data from the transmitter.
//!
//! Payload layout (little-endian):
//!
//! | Offset | Size | Field                         |
//! |--------|------|-------------------------------|
//! | 3      | 1    | command (0 = channel data)    |
//! | 4      | 1    | reply id                      |
//! | 5      | 1    | signal quality (rssi, signed) |
//! | 6      | 2    | frame losses                  |
//! | 8      | 4    | channel presence mask         |
//! | 12     | 2·n  | one value per set mask bit    |

use crate::frame::{write_header, FrameError, TYPE_CONTROL};

/// Number of channels addressable by the presence mask
pub const MAX_CHANNELS: usize = 32;

/// Offset of the first channel value
const VALUES_OFFSET: usize = 12;

/// Command byte for a channel data frame
pub const COMMAND_CHANNEL_DATA: u8 = 0;

/// Map a raw 16-bit channel value onto the 1000-2000 µs pulse scale
pub fn pulse_equivalent(raw: u16) -> u16 {
    (1000 + (1000 * raw as u32) / 0xFFFF) as u16
}

/// Channel id → sample mapping
///
/// Channel ids are 1-based: mask bit 0 is channel 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelMap {
    mask: u32,
    values: [u16; MAX_CHANNELS],
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelMap {
    /// Create an empty map
    pub const fn new() -> Self {
        Self {
            mask: 0,
            values: [0; MAX_CHANNELS],
        }
    }

    /// Set the sample for a channel
    ///
    /// Returns false if the channel id is outside 1..=32.
    pub fn insert(&mut self, channel: u8, value: u16) -> bool {
        match Self::index(channel) {
            Some(i) => {
                self.mask |= 1 << i;
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    /// Get the sample for a channel, if present
    pub fn get(&self, channel: u8) -> Option<u16> {
        let i = Self::index(channel)?;
        (self.mask & (1 << i) != 0).then_some(self.values[i])
    }

    /// Check if a channel is present
    pub fn contains(&self, channel: u8) -> bool {
        self.get(channel).is_some()
    }

    /// Presence mask (bit 0 = channel 1)
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Number of channels present
    pub fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    /// Check if no channel is present
    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Iterate present channels in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (u8, u16)> + '_ {
        (0..MAX_CHANNELS)
            .filter(move |&i| self.mask & (1 << i) != 0)
            .map(move |i| (i as u8 + 1, self.values[i]))
    }

    /// Return a copy with every sample remapped to the pulse scale
    pub fn to_pulse_scale(&self) -> Self {
        let mut out = *self;
        for i in 0..MAX_CHANNELS {
            if self.mask & (1 << i) != 0 {
                out.values[i] = pulse_equivalent(self.values[i]);
            }
        }
        out
    }

    fn index(channel: u8) -> Option<usize> {
        let channel = channel as usize;
        (1..=MAX_CHANNELS).contains(&channel).then(|| channel - 1)
    }
}

/// A decoded control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlFrame {
    /// Command byte (0 = channel data)
    pub command: u8,
    /// Device id expected to reply
    pub reply_id: u8,
    /// Signal quality
    pub rssi: i8,
    /// Frames lost since power-up
    pub frame_losses: u16,
    /// Raw channel samples (empty unless command is channel data)
    pub channels: ChannelMap,
}

impl ControlFrame {
    /// Create a channel data frame
    pub fn channel_data(channels: ChannelMap) -> Self {
        Self {
            command: COMMAND_CHANNEL_DATA,
            reply_id: 0,
            rssi: 0,
            frame_losses: 0,
            channels,
        }
    }

    /// Decode from a complete frame (header included)
    pub(crate) fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        if frame.len() < VALUES_OFFSET {
            return Err(FrameError::Malformed);
        }

        let command = frame[3];
        let reply_id = frame[4];
        let rssi = frame[5] as i8;
        let frame_losses = u16::from_le_bytes([frame[6], frame[7]]);
        let mask = u32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]);

        let mut channels = ChannelMap::new();
        if command == COMMAND_CHANNEL_DATA {
            let mut offset = VALUES_OFFSET;
            for bit in 0..MAX_CHANNELS {
                if mask & (1 << bit) == 0 {
                    continue;
                }
                let bytes = frame
                    .get(offset..offset + 2)
                    .ok_or(FrameError::Malformed)?;
                channels.insert(bit as u8 + 1, u16::from_le_bytes([bytes[0], bytes[1]]));
                offset += 2;
            }
        }

        Ok(Self {
            command,
            reply_id,
            rssi,
            frame_losses,
            channels,
        })
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, FrameError> {
        let values = if self.command == COMMAND_CHANNEL_DATA {
            self.channels.len()
        } else {
            0
        };
        let length = VALUES_OFFSET + values * 2;
        write_header(buf, TYPE_CONTROL, length)?;

        buf[3] = self.command;
        buf[4] = self.reply_id;
        buf[5] = self.rssi as u8;
        buf[6..8].copy_from_slice(&self.frame_losses.to_le_bytes());
        let mask = if values > 0 { self.channels.mask() } else { 0 };
        buf[8..12].copy_from_slice(&mask.to_le_bytes());

        let mut offset = VALUES_OFFSET;
        if values > 0 {
            for (_, value) in self.channels.iter() {
                buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
                offset += 2;
            }
        }

        Ok(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{parse, Packet, MAX_FRAME_SIZE};
    use proptest::prelude::*;

    fn decode_control(buf: &[u8]) -> Result<ControlFrame, FrameError> {
        match parse(buf)? {
            (Packet::Control(frame), _) => Ok(frame),
            _ => panic!("expected control frame"),
        }
    }

    fn sample_frame() -> ([u8; 16], usize) {
        let mut channels = ChannelMap::new();
        channels.insert(1, 100);
        channels.insert(4, 200);
        let mut buf = [0u8; 16];
        let len = ControlFrame::channel_data(channels).encode(&mut buf).unwrap();
        (buf, len)
    }

    #[test]
    fn test_mask_selects_channels() {
        let (buf, len) = sample_frame();
        assert_eq!(len, 16);
        assert_eq!(&buf[8..12], &[0b1001, 0, 0, 0]);

        let frame = decode_control(&buf[..len]).unwrap();
        assert_eq!(frame.channels.len(), 2);
        assert_eq!(frame.channels.get(1), Some(100));
        assert_eq!(frame.channels.get(4), Some(200));
        assert_eq!(frame.channels.get(2), None);
    }

    #[test]
    fn test_truncated_buffer_is_not_a_frame() {
        let (buf, len) = sample_frame();
        let result = parse(&buf[..len - 1]);
        assert_eq!(result, Err(FrameError::Incomplete));
    }

    #[test]
    fn test_short_declared_length_is_malformed() {
        let (mut buf, len) = sample_frame();
        // Header claims one byte less than the mask requires
        buf[2] = (len - 1) as u8;
        assert_eq!(decode_control(&buf[..len]), Err(FrameError::Malformed));
    }

    #[test]
    fn test_header_only_control_is_malformed() {
        let buf = [0xA6, TYPE_CONTROL, 8, 0, 0, 0, 0, 0];
        assert_eq!(decode_control(&buf), Err(FrameError::Malformed));
    }

    #[test]
    fn test_non_data_command_has_no_channels() {
        // Mask claims channels but command 1 carries none
        let buf = [0xA6, TYPE_CONTROL, 12, 1, 0, 0, 0, 0, 0xFF, 0, 0, 0];
        let frame = decode_control(&buf).unwrap();
        assert_eq!(frame.command, 1);
        assert!(frame.channels.is_empty());
    }

    #[test]
    fn test_header_fields() {
        let buf = [0xA6, TYPE_CONTROL, 12, 0, 0x30, 0xD8, 0x34, 0x12, 0, 0, 0, 0];
        let frame = decode_control(&buf).unwrap();
        assert_eq!(frame.reply_id, 0x30);
        assert_eq!(frame.rssi, -40);
        assert_eq!(frame.frame_losses, 0x1234);
    }

    #[test]
    fn test_pulse_equivalent_range() {
        assert_eq!(pulse_equivalent(0), 1000);
        assert_eq!(pulse_equivalent(0x8000), 1500);
        assert_eq!(pulse_equivalent(0xFFFF), 2000);
    }

    #[test]
    fn test_channel_ids_out_of_range() {
        let mut map = ChannelMap::new();
        assert!(!map.insert(0, 1));
        assert!(!map.insert(33, 1));
        assert!(map.insert(32, 7));
        assert_eq!(map.get(32), Some(7));
        assert_eq!(map.mask(), 1 << 31);
    }

    proptest! {
        #[test]
        fn prop_any_mask_decodes_in_channel_order(mask in 0u32..(1 << 16), seed in any::<u16>()) {
            let mut channels = ChannelMap::new();
            for bit in 0..16u8 {
                if mask & (1 << bit) != 0 {
                    channels.insert(bit + 1, seed.wrapping_add(bit as u16 * 977));
                }
            }
            let mut buf = [0u8; MAX_FRAME_SIZE];
            let len = ControlFrame::channel_data(channels).encode(&mut buf).unwrap();
            let (packet, used) = parse(&buf[..len]).unwrap();
            prop_assert_eq!(used, len);
            prop_assert_eq!(packet, Packet::Control(ControlFrame::channel_data(channels)));
        }
    }
}
