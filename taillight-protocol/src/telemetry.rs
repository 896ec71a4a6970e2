//! Telemetry frames: readings reported by devices on the bus.
//!
//! Common payload: destination id, device id, sub-id, then 14 bytes of
//! device-specific data. Device data is big-endian and every field has a
//! fixed decimal scale; values are kept as scaled integers.

use crate::frame::{write_header, FrameError, TYPE_TELEMETRY};

/// Device id of an electronic speed controller
pub const DEVICE_ESC: u8 = 0x20;

/// Size of the device-specific data block
pub const DEVICE_DATA_SIZE: usize = 14;

/// Offset of the device-specific data block
const DATA_OFFSET: usize = 6;

/// Total length of a telemetry frame
pub const TELEMETRY_FRAME_SIZE: usize = DATA_OFFSET + DEVICE_DATA_SIZE;

/// ESC telemetry readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EscTelemetry {
    /// Motor speed (RPM)
    pub rpm: u32,
    /// Input voltage (0.01 V units)
    pub volts_input_x100: u16,
    /// FET temperature (0.1°C units)
    pub temp_fet_x10: u16,
    /// Motor current (mA)
    pub current_motor_ma: u32,
    /// BEC temperature (0.1°C units)
    pub temp_bec_x10: u16,
    /// BEC current (mA)
    pub current_bec_ma: u16,
    /// BEC voltage (mV)
    pub volts_bec_mv: u16,
    /// Throttle position (0.5% units)
    pub throttle_x2: u8,
    /// Power output (0.5% units)
    pub power_out_x2: u8,
}

impl EscTelemetry {
    /// Decode the 14-byte device data block
    fn decode(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < DEVICE_DATA_SIZE {
            return Err(FrameError::Malformed);
        }
        let be16 = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);

        Ok(Self {
            rpm: be16(0) as u32 * 10,
            volts_input_x100: be16(2),
            temp_fet_x10: be16(4),
            current_motor_ma: be16(6) as u32 * 10,
            temp_bec_x10: be16(8),
            current_bec_ma: data[10] as u16 * 100,
            volts_bec_mv: data[11] as u16 * 50,
            throttle_x2: data[12],
            power_out_x2: data[13],
        })
    }

    /// Encode into a complete telemetry frame
    ///
    /// Scaled values are truncated back to their wire resolution.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, FrameError> {
        write_header(buf, TYPE_TELEMETRY, TELEMETRY_FRAME_SIZE)?;
        buf[3] = 0xFF;
        buf[4] = DEVICE_ESC;
        buf[5] = 0;

        let data = &mut buf[DATA_OFFSET..TELEMETRY_FRAME_SIZE];
        data[0..2].copy_from_slice(&((self.rpm / 10) as u16).to_be_bytes());
        data[2..4].copy_from_slice(&self.volts_input_x100.to_be_bytes());
        data[4..6].copy_from_slice(&self.temp_fet_x10.to_be_bytes());
        data[6..8].copy_from_slice(&((self.current_motor_ma / 10) as u16).to_be_bytes());
        data[8..10].copy_from_slice(&self.temp_bec_x10.to_be_bytes());
        data[10] = (self.current_bec_ma / 100) as u8;
        data[11] = (self.volts_bec_mv / 50) as u8;
        data[12] = self.throttle_x2;
        data[13] = self.power_out_x2;

        Ok(TELEMETRY_FRAME_SIZE)
    }

    /// Throttle position in whole percent
    pub fn throttle_pct(&self) -> u8 {
        self.throttle_x2 / 2
    }

    /// Power output in whole percent
    pub fn power_out_pct(&self) -> u8 {
        self.power_out_x2 / 2
    }

    /// FET temperature in whole degrees Celsius
    pub fn temp_fet_c(&self) -> i16 {
        (self.temp_fet_x10 / 10) as i16
    }

    /// Motor is turning
    pub fn is_moving(&self) -> bool {
        self.rpm > 0
    }

    /// ESC is actively braking: throttle applied but no power delivered
    pub fn is_braking(&self) -> bool {
        self.throttle_x2 > 10 && self.power_out_x2 == 0
    }
}

/// Device-specific part of a telemetry frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryData {
    /// Speed controller readings
    Esc(EscTelemetry),
    /// Device without a known layout; header only
    Other,
}

/// A decoded telemetry frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryRecord {
    /// Destination device id
    pub dest_id: u8,
    /// Reporting device id
    pub device_id: u8,
    /// Sensor sub-id
    pub sub_id: u8,
    /// Decoded device data
    pub data: TelemetryData,
}

impl TelemetryRecord {
    /// Decode from a complete frame (header included)
    pub(crate) fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        if frame.len() < TELEMETRY_FRAME_SIZE {
            return Err(FrameError::Malformed);
        }

        let device_id = frame[4];
        let device_data = &frame[DATA_OFFSET..TELEMETRY_FRAME_SIZE];
        let data = match device_id {
            DEVICE_ESC => TelemetryData::Esc(EscTelemetry::decode(device_data)?),
            _ => TelemetryData::Other,
        };

        Ok(Self {
            dest_id: frame[3],
            device_id,
            sub_id: frame[5],
            data,
        })
    }

    /// ESC readings, if this record came from a speed controller
    pub fn esc(&self) -> Option<&EscTelemetry> {
        match &self.data {
            TelemetryData::Esc(esc) => Some(esc),
            TelemetryData::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{parse, Packet, SYNC_BYTE};

    fn esc_frame(data: [u8; DEVICE_DATA_SIZE]) -> [u8; TELEMETRY_FRAME_SIZE] {
        let mut buf = [0u8; TELEMETRY_FRAME_SIZE];
        buf[0] = SYNC_BYTE;
        buf[1] = TYPE_TELEMETRY;
        buf[2] = TELEMETRY_FRAME_SIZE as u8;
        buf[3] = 0xFF;
        buf[4] = DEVICE_ESC;
        buf[DATA_OFFSET..].copy_from_slice(&data);
        buf
    }

    fn decode_record(buf: &[u8]) -> TelemetryRecord {
        match parse(buf).unwrap() {
            (Packet::Telemetry(record), _) => record,
            _ => panic!("expected telemetry"),
        }
    }

    #[test]
    fn test_esc_scales() {
        let rpm = 1234u16.to_be_bytes();
        let volts = 1370u16.to_be_bytes();
        let fet = 452u16.to_be_bytes();
        let data = [
            rpm[0], rpm[1], volts[0], volts[1], fet[0], fet[1], 0, 150, 0x01, 0x2C, 12, 100, 40,
            0,
        ];
        let record = decode_record(&esc_frame(data));
        let esc = record.esc().unwrap();

        assert_eq!(esc.rpm, 12340);
        assert_eq!(esc.volts_input_x100, 1370);
        assert_eq!(esc.temp_fet_x10, 452);
        assert_eq!(esc.temp_fet_c(), 45);
        assert_eq!(esc.current_motor_ma, 1500);
        assert_eq!(esc.temp_bec_x10, 300);
        assert_eq!(esc.current_bec_ma, 1200);
        assert_eq!(esc.volts_bec_mv, 5000);
        assert_eq!(esc.throttle_pct(), 20);
        assert_eq!(esc.power_out_pct(), 0);
        assert!(esc.is_moving());
        assert!(esc.is_braking());
    }

    #[test]
    fn test_unknown_device_decodes_header_only() {
        let mut buf = esc_frame([0xAB; DEVICE_DATA_SIZE]);
        buf[4] = 0x42;
        buf[5] = 3;
        let record = decode_record(&buf);
        assert_eq!(record.device_id, 0x42);
        assert_eq!(record.sub_id, 3);
        assert_eq!(record.data, TelemetryData::Other);
        assert!(record.esc().is_none());
    }

    #[test]
    fn test_short_telemetry_is_malformed() {
        let mut buf = esc_frame([0; DEVICE_DATA_SIZE]);
        buf[2] = 10;
        assert_eq!(parse(&buf), Err(FrameError::Malformed));
    }

    #[test]
    fn test_encode_matches_decode() {
        let esc = EscTelemetry {
            rpm: 5000,
            volts_input_x100: 1110,
            temp_fet_x10: 610,
            throttle_x2: 100,
            power_out_x2: 80,
            ..Default::default()
        };
        let mut buf = [0u8; 32];
        let len = esc.encode(&mut buf).unwrap();
        let record = decode_record(&buf[..len]);
        assert_eq!(record.esc(), Some(&esc));
        assert!(!esc.is_braking());
    }
}
