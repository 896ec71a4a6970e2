//! Telemetry readout
//!
//! Numbers are blinked digit by digit: a pause, then one short flash per
//! unit of the digit. Leading zeros are skipped; a zero after the first
//! non-zero digit is one long flash.

use crate::animation::Sequence;

/// Gap before each digit and after the number (ms)
const DIGIT_PAUSE_MS: u32 = 750;

/// Brightness of readout flashes
const READOUT_LEVEL: u8 = 75;

/// Largest value the readout can show
pub const MAX_READOUT: u16 = 999;

/// Pages of the readout, in click order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadoutPage {
    /// Present voltage per cell (centivolts)
    CellVoltage,
    /// Lowest voltage per cell seen (centivolts)
    LowCellVoltage,
    /// ESC temperature (°C)
    EscTemperature,
    /// External sensor temperature (°C)
    ExtTemperature,
}

impl ReadoutPage {
    /// Page shown after this one; `None` leaves the readout
    pub fn next(self) -> Option<Self> {
        match self {
            ReadoutPage::CellVoltage => Some(ReadoutPage::LowCellVoltage),
            ReadoutPage::LowCellVoltage => Some(ReadoutPage::EscTemperature),
            ReadoutPage::EscTemperature => Some(ReadoutPage::ExtTemperature),
            ReadoutPage::ExtTemperature => None,
        }
    }

    pub fn is_last(self) -> bool {
        self.next().is_none()
    }
}

/// Blink sequence for `value` (clamped to 0..=999)
pub fn number_sequence(value: i32) -> Sequence {
    let value = value.clamp(0, MAX_READOUT as i32) as u32;
    let mut seq = Sequence::new();
    let mut started = false;

    for div in [100, 10, 1] {
        let digit = (value / div) % 10;
        seq = seq.then(&Sequence::pause(DIGIT_PAUSE_MS));
        if digit > 0 {
            started = true;
            seq = seq.then(&Sequence::multi_flash(digit as u8, 150, 250, 250, false, READOUT_LEVEL));
        } else if started {
            seq = seq.then(&Sequence::multi_flash(1, 150, 750, 250, false, READOUT_LEVEL));
        }
    }

    seq.then(&Sequence::pause(DIGIT_PAUSE_MS))
}

/// Number of cells for a pack at `centivolts`, from its first reading
pub fn cell_count(centivolts: u16) -> Option<u8> {
    [8u8, 6, 4, 3, 2, 1]
        .into_iter()
        .find(|&cells| centivolts as u32 >= 316 * cells as u32)
}
