//! Signal format detection
//!
//! While idle, a pulse receiver holds its line for milliseconds between
//! pulses; a serial line at 115200 baud never idles longer than one byte
//! time (~78 µs) inside a frame. Each measured idle gap is classified long
//! or short, and a run of consecutive gaps of one class on any line decides
//! the format.

use heapless::Vec;

use super::{RcMode, MAX_LINES};

/// Gaps longer than this are pulse spacing (µs)
pub const LONG_GAP_US: u32 = 500;

/// Consecutive same-class gaps needed to decide
pub const REQUIRED_RUN: u16 = 50;

/// Classification of one idle gap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GapClass {
    /// Inter-pulse spacing
    Long,
    /// Serial bit or byte timing
    Short,
}

impl GapClass {
    pub fn of(gap_us: u32) -> Self {
        if gap_us > LONG_GAP_US {
            GapClass::Long
        } else {
            GapClass::Short
        }
    }

    /// Format this class indicates
    pub fn mode(self) -> RcMode {
        match self {
            GapClass::Long => RcMode::Pwm,
            GapClass::Short => RcMode::Smart,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LineRun {
    last: Option<GapClass>,
    run: u16,
}

/// Accumulates gap measurements until one line shows a steady format
#[derive(Debug, Clone)]
pub struct Detector {
    lines: Vec<LineRun, MAX_LINES>,
    detected: Option<(usize, RcMode)>,
}

impl Detector {
    /// Create a detector watching `lines` input lines
    pub fn new(lines: usize) -> Self {
        let mut runs = Vec::new();
        for _ in 0..lines.min(MAX_LINES) {
            let _ = runs.push(LineRun::default());
        }
        Self {
            lines: runs,
            detected: None,
        }
    }

    /// Record one measured idle gap on `line`
    ///
    /// Returns the detected format once any line has produced
    /// [`REQUIRED_RUN`] consecutive gaps of the same class. A class change
    /// restarts that line's run from zero.
    pub fn observe(&mut self, line: usize, gap_us: u32) -> Option<RcMode> {
        if let Some((_, mode)) = self.detected {
            return Some(mode);
        }
        let state = self.lines.get_mut(line)?;
        let class = GapClass::of(gap_us);

        if state.last == Some(class) {
            state.run = state.run.saturating_add(1);
        } else {
            state.last = Some(class);
            state.run = 0;
        }

        if state.run >= REQUIRED_RUN {
            self.detected = Some((line, class.mode()));
            return Some(class.mode());
        }
        None
    }

    /// Format detected so far
    pub fn detected(&self) -> Option<RcMode> {
        self.detected.map(|(_, mode)| mode)
    }

    /// Line the format was detected on
    pub fn detected_line(&self) -> Option<usize> {
        self.detected.map(|(line, _)| line)
    }

    /// Current run length on a line
    pub fn run(&self, line: usize) -> u16 {
        self.lines.get(line).map_or(0, |l| l.run)
    }
}
