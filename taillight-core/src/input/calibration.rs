//! Zero-reference calibration
//!
//! Receivers center their channels at slightly different values, so the
//! first frames after startup are only used to learn each bound channel's
//! neutral sample. A serial receiver also sends an auxiliary channel while
//! it is binding; calibration waits until it has disappeared.

use heapless::Vec;
use taillight_protocol::ChannelMap;

use super::RcMode;

/// Channel only present while a serial receiver is binding
pub const BIND_CHANNEL: u8 = 10;

/// Calibration completes after more than this many consecutive good frames
pub const REQUIRED_GOOD_FRAMES: u8 = 10;

/// Zero assumed for channels never calibrated (µs)
pub const NOMINAL_ZERO: u16 = 1500;

/// Progress of a calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationStatus {
    /// Consecutive good frames so far
    Pending(u8),
    /// Zero references are valid
    Complete,
}

/// Learns per-channel zero references from the first frames
#[derive(Debug, Clone)]
pub struct Calibration {
    mode: RcMode,
    channels: Vec<u8, 4>,
    tolerance: u16,
    zeros: ChannelMap,
    good: u8,
    complete: bool,
}

impl Calibration {
    /// Calibrate `channels` for a receiver of type `mode`
    ///
    /// Consecutive samples of one channel may differ by at most `tolerance`.
    pub fn new(mode: RcMode, channels: &[u8], tolerance: u16) -> Self {
        let mut bound = Vec::new();
        for &ch in channels.iter().filter(|&&ch| ch != 0) {
            if !bound.contains(&ch) {
                let _ = bound.push(ch);
            }
        }
        Self {
            mode,
            channels: bound,
            tolerance,
            zeros: ChannelMap::new(),
            good: 0,
            complete: false,
        }
    }

    /// Feed one decoded frame
    pub fn observe(&mut self, frame: &ChannelMap) -> CalibrationStatus {
        if self.complete {
            return CalibrationStatus::Complete;
        }

        let mut present = true;
        let mut steady = true;
        for &ch in &self.channels {
            match frame.get(ch) {
                Some(v) => {
                    if let Some(prev) = self.zeros.get(ch) {
                        steady &= v.abs_diff(prev) <= self.tolerance;
                    }
                    self.zeros.insert(ch, v);
                }
                None => present = false,
            }
        }

        let bound = match self.mode {
            RcMode::Pwm => true,
            RcMode::Smart => !frame.is_empty() && !frame.contains(BIND_CHANNEL),
        };

        if !steady {
            self.good = 0;
        } else if present && bound {
            self.good = self.good.saturating_add(1);
        }

        if self.good > REQUIRED_GOOD_FRAMES {
            self.complete = true;
            return CalibrationStatus::Complete;
        }
        CalibrationStatus::Pending(self.good)
    }

    /// Forget every sample and start counting good frames again
    ///
    /// Zeros are never guessed: a completed calibration is kept as is.
    pub fn restart(&mut self) {
        if self.complete {
            return;
        }
        self.zeros = ChannelMap::new();
        self.good = 0;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Zero reference for a channel
    pub fn zero(&self, channel: u8) -> u16 {
        self.zeros.get(channel).unwrap_or(NOMINAL_ZERO)
    }

    /// Channels being calibrated
    pub fn channels(&self) -> &[u8] {
        &self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: &[(u8, u16)]) -> ChannelMap {
        let mut map = ChannelMap::new();
        for &(ch, v) in samples {
            map.insert(ch, v);
        }
        map
    }

    #[test]
    fn test_completes_after_eleven_good_frames() {
        let mut cal = Calibration::new(RcMode::Smart, &[1, 8], 20);
        let f = frame(&[(1, 1490), (8, 1505)]);
        for i in 1..=REQUIRED_GOOD_FRAMES {
            assert_eq!(cal.observe(&f), CalibrationStatus::Pending(i));
        }
        assert_eq!(cal.observe(&f), CalibrationStatus::Complete);
        assert_eq!(cal.zero(1), 1490);
        assert_eq!(cal.zero(8), 1505);
    }

    #[test]
    fn test_waits_for_bind_channel_to_go() {
        let mut cal = Calibration::new(RcMode::Smart, &[1], 20);
        let binding = frame(&[(1, 1500), (BIND_CHANNEL, 1000)]);
        for _ in 0..30 {
            assert_eq!(cal.observe(&binding), CalibrationStatus::Pending(0));
        }
        assert_eq!(cal.observe(&frame(&[(1, 1500)])), CalibrationStatus::Pending(1));
    }

    #[test]
    fn test_pwm_ignores_bind_channel() {
        let mut cal = Calibration::new(RcMode::Pwm, &[1], 20);
        let f = frame(&[(1, 1500), (BIND_CHANNEL, 1000)]);
        assert_eq!(cal.observe(&f), CalibrationStatus::Pending(1));
    }

    #[test]
    fn test_empty_serial_frame_is_not_good() {
        let mut cal = Calibration::new(RcMode::Smart, &[], 20);
        assert_eq!(cal.observe(&ChannelMap::new()), CalibrationStatus::Pending(0));
    }

    #[test]
    fn test_jump_restarts_count() {
        let mut cal = Calibration::new(RcMode::Pwm, &[1], 20);
        for _ in 0..5 {
            cal.observe(&frame(&[(1, 1500)]));
        }
        assert_eq!(cal.observe(&frame(&[(1, 1600)])), CalibrationStatus::Pending(0));
        assert_eq!(cal.observe(&frame(&[(1, 1605)])), CalibrationStatus::Pending(1));
        assert_eq!(cal.zero(1), 1605);
    }

    #[test]
    fn test_missing_channel_not_counted() {
        let mut cal = Calibration::new(RcMode::Pwm, &[1, 2], 20);
        cal.observe(&frame(&[(1, 1500), (2, 1500)]));
        assert_eq!(cal.observe(&frame(&[(1, 1500)])), CalibrationStatus::Pending(1));
    }

    #[test]
    fn test_restart_forgets_progress() {
        let mut cal = Calibration::new(RcMode::Smart, &[1, 2, 2, 0], 20);
        assert_eq!(cal.channels(), &[1, 2]);
        for _ in 0..5 {
            cal.observe(&frame(&[(1, 1400), (2, 1420)]));
        }
        cal.restart();
        assert!(!cal.is_complete());
        // The next frame may differ from the discarded ones
        assert_eq!(cal.observe(&frame(&[(1, 1300), (2, 1420)])), CalibrationStatus::Pending(1));
        for _ in 0..REQUIRED_GOOD_FRAMES {
            cal.observe(&frame(&[(1, 1300), (2, 1420)]));
        }
        assert!(cal.is_complete());
        assert_eq!(cal.zero(1), 1300);
    }

    #[test]
    fn test_restart_keeps_completed_zeros() {
        let mut cal = Calibration::new(RcMode::Pwm, &[1], 20);
        for _ in 0..=REQUIRED_GOOD_FRAMES {
            cal.observe(&frame(&[(1, 1480)]));
        }
        cal.restart();
        assert!(cal.is_complete());
        assert_eq!(cal.zero(1), 1480);
    }
}
