//! Light output drivers
//!
//! [`PwmLight`] dims through a PWM channel; [`DigitalLight`] switches a
//! plain GPIO. [`LightDriver`] lets one board mix both behind a single
//! output type.

pub mod digital;
pub mod pwm;

pub use digital::DigitalLight;
pub use pwm::PwmLight;

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use taillight_core::LightOutput;

/// Either kind of light output
pub enum LightDriver<P, D> {
    Pwm(PwmLight<P>),
    Digital(DigitalLight<D>),
}

impl<P: SetDutyCycle, D: OutputPin> LightDriver<P, D> {
    /// True once the hardware has rejected a write
    pub fn has_fault(&self) -> bool {
        match self {
            LightDriver::Pwm(l) => l.has_fault(),
            LightDriver::Digital(l) => l.has_fault(),
        }
    }
}

impl<P: SetDutyCycle, D: OutputPin> LightOutput for LightDriver<P, D> {
    fn set_level(&mut self, percent: u8) {
        match self {
            LightDriver::Pwm(l) => l.set_level(percent),
            LightDriver::Digital(l) => l.set_level(percent),
        }
    }
}

impl<P, D> From<PwmLight<P>> for LightDriver<P, D> {
    fn from(light: PwmLight<P>) -> Self {
        LightDriver::Pwm(light)
    }
}

impl<P, D> From<DigitalLight<D>> for LightDriver<P, D> {
    fn from(light: DigitalLight<D>) -> Self {
        LightDriver::Digital(light)
    }
}
