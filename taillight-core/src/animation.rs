//! Brightness curves and running animations
//!
//! Every curve is a pure function of elapsed milliseconds: it returns a
//! brightness in percent, or `None` once the curve has finished. Looping is
//! applied outside the curve by reducing elapsed time modulo the period.

use heapless::Vec;

/// Breakpoints a sequence can hold
pub const MAX_STEPS: usize = 64;

/// Width of the breathe peak (fraction of the breathe time)
const BREATHE_GAMMA: f32 = 0.14;

/// Position of the breathe peak (fraction of the breathe time)
const BREATHE_CENTER: f32 = 0.5;

/// Animation slot priority; higher wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Priority(pub i8);

impl Priority {
    /// Sleep indication, below everything else
    pub const BREATHE: Self = Self(-1);
    /// Fades between steady levels
    pub const TRANSITION: Self = Self(0);
    /// Turn signals
    pub const TURN: Self = Self(1);
    /// Emergency flasher
    pub const EMERGENCY: Self = Self(2);
    /// Menu and telemetry readout; also the gate while either is open
    pub const MENU: Self = Self(10);
    /// ESC over-temperature alarm
    pub const ESC_ALARM: Self = Self(11);
    /// External over-temperature alarm
    pub const EXT_ALARM: Self = Self(12);
    /// Bench identify/on/off
    pub const BENCH: Self = Self(13);
}

/// One breakpoint: `level` holds from `at` until the next breakpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Step {
    pub level: u8,
    pub at: u32,
}

/// Step-wise sequence of levels
///
/// The last breakpoint marks the end; its level is never shown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sequence {
    steps: Vec<Step, MAX_STEPS>,
}

impl Sequence {
    pub const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Build from `(level, at)` pairs
    pub fn from_steps(steps: &[(u8, u32)]) -> Self {
        steps
            .iter()
            .fold(Self::new(), |seq, &(level, at)| seq.step(level, at))
    }

    /// Append a breakpoint; breakpoints past [`MAX_STEPS`] are dropped
    pub fn step(mut self, level: u8, at: u32) -> Self {
        let _ = self.steps.push(Step { level, at });
        self
    }

    /// Darkness for `duration` ms
    pub fn pause(duration: u32) -> Self {
        Self::new().step(0, duration)
    }

    /// `n` flashes of `on` ms separated by `off` ms, after `start` ms dark
    ///
    /// `invert` swaps the lit and dark phases.
    pub fn multi_flash(n: u8, start: u32, on: u32, off: u32, invert: bool, brightness: u8) -> Self {
        let (a, b) = if invert { (0, brightness) } else { (brightness, 0) };
        let mut seq = Self::new().step(0, 0);
        for i in 0..n as u32 {
            seq = seq
                .step(a, start + (on + off) * i)
                .step(b, start + (on + off) * i + on);
        }
        seq.step(b, n as u32 * (on + off) + off)
    }

    /// Single short full-brightness blip
    pub fn flash() -> Self {
        Self::from_steps(&[(100, 0), (0, 50), (0, 100)])
    }

    /// Append `other` after this sequence ends
    pub fn then(mut self, other: &Sequence) -> Self {
        let offset = self.length();
        for step in &other.steps {
            if self.steps.push(Step { level: step.level, at: step.at + offset }).is_err() {
                break;
            }
        }
        self
    }

    /// Time of the final breakpoint
    pub fn length(&self) -> u32 {
        self.steps.last().map_or(0, |s| s.at)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Level of the latest breakpoint at or before `t`; the final
    /// breakpoint's level is shown only at `t == length`
    fn level(&self, t: u32) -> Option<u8> {
        if t > self.length() {
            return None;
        }
        let first = self.steps.first().map_or(0, |s| s.level);
        Some(
            self.steps
                .iter()
                .rev()
                .find(|s| s.at <= t)
                .map_or(first, |s| s.level),
        )
    }
}

/// Brightness curve
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Curve {
    /// Linear ramp between two levels
    Fade { from: u8, to: u8, duration: u32 },
    /// Gaussian pulse over `duration`, then `min_pct` of `brightness` for `gap`
    Breathe {
        duration: u32,
        gap: u32,
        brightness: u8,
        min_pct: u8,
    },
    /// Breakpoint sequence
    Sequence(Sequence),
    /// Off→on ramp for the first half period, on→off ramp for the second
    FadedFlash {
        on: u8,
        off: u8,
        period: u32,
        fade: u32,
    },
    /// `flashes` flashes at `level1`, then `flashes` at `level2`, each side
    /// lasting `period`
    EmergencyFlash {
        level1: u8,
        level2: u8,
        period: u32,
        flashes: u8,
        fade: u32,
    },
}

impl Curve {
    /// Time after which the curve is finished
    pub fn period(&self) -> u32 {
        match self {
            Curve::Fade { duration, .. } => *duration,
            Curve::Breathe { duration, gap, .. } => duration + gap,
            Curve::Sequence(seq) => seq.length(),
            Curve::FadedFlash { period, .. } => *period,
            Curve::EmergencyFlash { period, .. } => period * 2,
        }
    }

    /// Level `t` ms after the start, or `None` once finished
    pub fn level(&self, t: u32) -> Option<u8> {
        if t > self.period() {
            return None;
        }
        let level = match self {
            Curve::Fade { from, to, duration } => {
                if *duration == 0 {
                    *to
                } else {
                    ramp(*from, *to, t, *duration)
                }
            }
            Curve::Breathe {
                duration,
                brightness,
                min_pct,
                ..
            } => breathe(t, *duration, *brightness, *min_pct),
            Curve::Sequence(seq) => return seq.level(t),
            Curve::FadedFlash {
                on,
                off,
                period,
                fade,
            } => {
                let half = (period / 2).max(1);
                let f = (t % half).min(*fade);
                let (from, to) = if t < half { (*off, *on) } else { (*on, *off) };
                if *fade == 0 {
                    to
                } else {
                    ramp(from, to, f, *fade)
                }
            }
            Curve::EmergencyFlash {
                level1,
                level2,
                period,
                flashes,
                fade,
            } => {
                let side = if t < *period { *level1 } else { *level2 };
                let slot = (period / (2 * (*flashes).max(1) as u32)).max(1);
                let fade = (*fade).min(slot);
                let lit = (t / slot) % 2 == 1;
                let (from, to) = if lit { (0, side) } else { (side, 0) };
                if fade == 0 {
                    to
                } else {
                    ramp(from, to, (t % slot).min(fade), fade)
                }
            }
        };
        Some(level)
    }
}

/// Linear interpolation `from → to` at `t` of `duration`, clamped to 0..=100
fn ramp(from: u8, to: u8, t: u32, duration: u32) -> u8 {
    let delta = to as i64 - from as i64;
    let level = from as i64 + delta * t as i64 / duration as i64;
    level.clamp(0, 100) as u8
}

fn breathe(t: u32, duration: u32, brightness: u8, min_pct: u8) -> u8 {
    let peak = brightness as f32;
    let floor = peak * min_pct as f32 / 100.0;
    if duration == 0 || t > duration {
        return floor as u8;
    }
    let x = (t as f32 / duration as f32 - BREATHE_CENTER) / BREATHE_GAMMA;
    let level = libm::expf(-(x * x) / 2.0) * (peak - floor) + floor;
    libm::roundf(level).clamp(0.0, 100.0) as u8
}

/// What happens when a non-looping animation finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OnComplete {
    /// Remove the slot
    #[default]
    Discard,
    /// Start a fresh copy at the completion time
    Restart,
    /// Remove the slot and report the completion to the owner
    Report(Completion),
}

/// Completions reported back through [`OnComplete::Report`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion {
    /// The last telemetry readout digit has been shown
    ReadoutFinished,
}

/// A curve bound to a start time
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Animation {
    pub curve: Curve,
    pub start: u32,
    pub looping: bool,
    /// Displayed level is scaled by the light's menu percentage
    pub preview: bool,
    pub on_complete: OnComplete,
}

impl Animation {
    /// A one-shot animation starting at `start`
    pub fn new(curve: Curve, start: u32) -> Self {
        Self {
            curve,
            start,
            looping: false,
            preview: false,
            on_complete: OnComplete::Discard,
        }
    }

    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    pub fn preview(mut self) -> Self {
        self.preview = true;
        self
    }

    pub fn on_complete(mut self, on_complete: OnComplete) -> Self {
        self.on_complete = on_complete;
        self
    }

    /// Level at `now`, or `None` once a one-shot animation has finished
    pub fn level_at(&self, now: u32) -> Option<u8> {
        let mut t = now.wrapping_sub(self.start);
        let period = self.curve.period();
        if self.looping && period > 0 {
            t %= period;
        }
        self.curve.level(t)
    }
}
