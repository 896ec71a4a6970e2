//! On/off light output
//!
//! For outputs without a PWM channel. Levels above half brightness switch
//! the light on, so a dimmed tail light still shows.

use embedded_hal::digital::OutputPin;
use taillight_core::LightOutput;

/// Levels above this switch a digital light on
pub const ON_THRESHOLD: u8 = 50;

/// Light switched by a GPIO pin
pub struct DigitalLight<P> {
    pin: P,
    /// If true, light ON = pin LOW
    inverted: bool,
    on: bool,
    fault: bool,
}

impl<P: OutputPin> DigitalLight<P> {
    /// Create the output and switch it off
    pub fn new(pin: P, inverted: bool) -> Self {
        let mut light = Self {
            pin,
            inverted,
            on: false,
            fault: false,
        };
        light.set_level(0);
        light
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn has_fault(&self) -> bool {
        self.fault
    }
}

impl<P: OutputPin> LightOutput for DigitalLight<P> {
    fn set_level(&mut self, percent: u8) {
        self.on = percent > ON_THRESHOLD;
        let result = if self.on != self.inverted {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if result.is_err() {
            self.fault = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;

    /// Mock GPIO pin for testing
    struct MockPin {
        high: bool,
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            Ok(())
        }

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }
    }

    #[test]
    fn test_active_high_light() {
        let mut light = DigitalLight::new(MockPin { high: true }, false);
        assert!(!light.is_on());
        assert!(!light.pin.high);

        light.set_level(100);
        assert!(light.is_on());
        assert!(light.pin.high);

        light.set_level(50);
        assert!(!light.is_on());
        assert!(!light.pin.high);

        light.set_level(51);
        assert!(light.pin.high);
    }

    #[test]
    fn test_active_low_light() {
        let mut light = DigitalLight::new(MockPin { high: false }, true);
        assert!(!light.is_on());
        assert!(light.pin.high);

        light.set_level(80);
        assert!(light.is_on());
        assert!(!light.pin.high);
        assert!(!light.has_fault());
    }

    #[test]
    fn test_through_trait() {
        fn drive<L: LightOutput>(l: &mut L) {
            l.set_level(90);
        }

        let mut light = DigitalLight::new(MockPin { high: false }, false);
        drive(&mut light);
        assert!(light.is_on());
    }
}
