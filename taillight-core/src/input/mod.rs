//! Signal acquisition
//!
//! The receiver is either a pulse (PWM) receiver, one line per channel, or a
//! serial (SMART) receiver streaming binary frames on a single line. Which
//! one is connected is detected once at startup from the timing of the idle
//! gaps on the input lines; afterwards the matching decoder feeds channel
//! samples to calibration and then to the vehicle.

pub mod calibration;
pub mod detect;
pub mod pulse;

pub use calibration::{Calibration, CalibrationStatus};
pub use detect::{Detector, GapClass};
pub use pulse::PulseInput;

/// Maximum number of input lines
pub const MAX_LINES: usize = 4;

/// Receiver signal format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RcMode {
    /// One pulse-width line per channel
    Pwm,
    /// Binary control/telemetry frames
    Smart,
}
