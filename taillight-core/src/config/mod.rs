//! Controller configuration
//!
//! A single [`Config`] value holds every tunable. It is owned by the
//! vehicle; external collaborators (menu, command line, config text) change
//! it through the validating dotted-path accessors in [`path`], and the
//! vehicle picks the change up on its next reconfigure.

pub mod path;
pub mod text;

use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::input::RcMode;

pub use path::{ConfigError, Value};

/// Maximum number of light outputs
pub const MAX_LIGHTS: usize = 8;

/// Per-light brightness targets, in percent (0 = not used in that state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LightConfig {
    /// Low beam
    pub mode1: u8,
    /// High beam
    pub mode2: u8,
    pub brake: u8,
    pub flash: u8,
    pub turn_left: u8,
    pub turn_right: u8,
    /// Emergency flasher, first side
    pub emergency1: u8,
    /// Emergency flasher, second side
    pub emergency2: u8,
    /// Sleep indication peak
    pub breathe: u8,
    /// Scale applied to menu previews
    pub menu: u8,
}

impl LightConfig {
    /// A light that is only used for the two beam levels
    pub const fn beams(mode1: u8, mode2: u8) -> Self {
        Self {
            mode1,
            mode2,
            brake: 0,
            flash: 0,
            turn_left: 0,
            turn_right: 0,
            emergency1: 0,
            emergency2: 0,
            breathe: 0,
            menu: 100,
        }
    }
}

/// Brake light policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BrakeMode {
    /// Brake exactly while the throttle reads reverse
    Simple,
    /// Brake on the first reverse application only; further reverse is
    /// reversing until the throttle goes forward again
    #[default]
    Smart,
    /// Brake for a fixed window after the throttle returns to neutral
    LiftOffDelay,
}

/// When the emergency flasher runs on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EmergencyMode {
    /// Only when toggled manually
    #[default]
    Off,
    /// Whenever the high beam is selected
    HighBeam,
    /// Whenever any light mode is on
    AnyMode,
}

/// What the secondary button does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SecondaryButtonMode {
    #[default]
    None,
    /// Flash while held
    Flash,
    /// Handbrake while held
    Brake,
    /// Short click toggles the emergency flasher
    EmergencyToggle,
}

/// Receiver channels used for each input (0 = unbound)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bindings {
    pub throttle: u8,
    pub steering: u8,
    pub primary_button: u8,
    pub primary_button_reverse: bool,
    pub secondary_button: u8,
    pub secondary_button_reverse: bool,
    /// Proportional channel forwarded to the menu
    pub level: u8,
}

impl Bindings {
    /// Channels that must be present before calibration can finish
    pub fn calibrated_channels(&self) -> Vec<u8, 4> {
        let mut out = Vec::new();
        for ch in [
            self.throttle,
            self.steering,
            self.primary_button,
            self.secondary_button,
        ] {
            if ch != 0 && !out.contains(&ch) {
                let _ = out.push(ch);
            }
        }
        out
    }
}

/// All tunables
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    pub lights: Vec<LightConfig, MAX_LIGHTS>,
    /// Channel bindings for serial (SMART) receivers
    pub smart: Bindings,
    /// Channel bindings for pulse (PWM) receivers; line `n` is channel `n + 1`
    pub pwm: Bindings,
    /// Throttle dead zone half-width (µs)
    pub throttle_threshold: u16,
    /// Steering dead zone half-width (µs)
    pub steering_threshold: u16,
    /// Button channel dead zone half-width (µs)
    pub button_threshold: u16,
    /// Level channel reading mapped to 0%
    pub level_min: u16,
    /// Level channel reading mapped to 100%
    pub level_max: u16,
    /// Largest frame-to-frame change accepted while calibrating (µs)
    pub calibration_tolerance: u16,
    /// Duration of level changes and flash edges (ms)
    pub fade_time: u16,
    /// Breathe pulse length (ms)
    pub breathe_time: u16,
    /// Dark gap between breathe pulses (ms)
    pub breathe_gap: u16,
    /// Breathe floor as a percentage of the light's breathe level
    pub breathe_min_brightness: u8,
    /// Inactivity before sleeping (s)
    pub sleep_delay: u16,
    /// Sleep even when a light mode is selected
    pub sleep_when_lights_on: bool,
    /// Brake policy without ESC telemetry
    pub brake_mode: BrakeMode,
    pub emergency_mode: EmergencyMode,
    /// Length of one emergency side (ms)
    pub emergency_flash_period: u16,
    pub emergency_flashes_per_side: u8,
    /// Fade emergency flash edges by `fade_time`
    pub emergency_fade: bool,
    pub secondary_button_mode: SecondaryButtonMode,
    /// ESC alarm threshold (°C)
    pub esc_temperature_alarm: i16,
    pub esc_temperature_alarm_enable: bool,
    /// External sensor alarm threshold (°C)
    pub ext_temperature_alarm: i16,
    pub ext_temperature_alarm_enable: bool,
}

impl Default for Config {
    fn default() -> Self {
        let mut lights = Vec::new();
        let _ = lights.push(LightConfig {
            flash: 100,
            emergency1: 100,
            ..LightConfig::beams(20, 60)
        });
        let _ = lights.push(LightConfig {
            turn_left: 100,
            breathe: 50,
            ..LightConfig::beams(30, 90)
        });
        let _ = lights.push(LightConfig {
            brake: 90,
            turn_right: 100,
            emergency2: 100,
            breathe: 50,
            ..LightConfig::beams(30, 70)
        });

        Self {
            lights,
            smart: Bindings {
                throttle: 1,
                steering: 2,
                primary_button: 8,
                primary_button_reverse: false,
                secondary_button: 8,
                secondary_button_reverse: true,
                level: 6,
            },
            pwm: Bindings {
                throttle: 0,
                steering: 0,
                primary_button: 1,
                primary_button_reverse: false,
                secondary_button: 1,
                secondary_button_reverse: true,
                level: 0,
            },
            throttle_threshold: 120,
            steering_threshold: 120,
            button_threshold: 20,
            level_min: 1170,
            level_max: 1660,
            calibration_tolerance: 20,
            fade_time: 90,
            breathe_time: 3000,
            breathe_gap: 1500,
            breathe_min_brightness: 10,
            sleep_delay: 30,
            sleep_when_lights_on: false,
            brake_mode: BrakeMode::Smart,
            emergency_mode: EmergencyMode::Off,
            emergency_flash_period: 400,
            emergency_flashes_per_side: 2,
            emergency_fade: true,
            secondary_button_mode: SecondaryButtonMode::None,
            esc_temperature_alarm: 80,
            esc_temperature_alarm_enable: true,
            ext_temperature_alarm: 60,
            ext_temperature_alarm_enable: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel bindings for an input mode
    pub fn bindings(&self, mode: RcMode) -> &Bindings {
        match mode {
            RcMode::Smart => &self.smart,
            RcMode::Pwm => &self.pwm,
        }
    }

    /// Map a level channel sample onto 0-100%
    pub fn level_percent(&self, sample: u16) -> u8 {
        if self.level_max <= self.level_min {
            return 0;
        }
        let span = (self.level_max - self.level_min) as i32;
        let pct = 100 * (sample as i32 - self.level_min as i32) / span;
        pct.clamp(0, 100) as u8
    }

    /// Sleep delay in milliseconds
    pub fn sleep_delay_ms(&self) -> u32 {
        self.sleep_delay as u32 * 1000
    }
}
