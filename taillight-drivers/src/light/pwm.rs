//! PWM-dimmed light output

use embedded_hal::pwm::SetDutyCycle;
use taillight_core::LightOutput;

/// Light driven by one PWM channel
///
/// The level maps linearly onto the duty cycle. With `inverted` set the
/// LED is on while the pin is low (common-anode wiring or a P-channel
/// driver).
pub struct PwmLight<P> {
    channel: P,
    inverted: bool,
    level: u8,
    /// Set when the channel rejects a duty cycle
    fault: bool,
}

impl<P: SetDutyCycle> PwmLight<P> {
    /// Create the output and switch it off
    pub fn new(channel: P, inverted: bool) -> Self {
        let mut light = Self {
            channel,
            inverted,
            level: 0,
            fault: false,
        };
        light.set_level(0);
        light
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn has_fault(&self) -> bool {
        self.fault
    }

    pub fn release(self) -> P {
        self.channel
    }
}

impl<P: SetDutyCycle> LightOutput for PwmLight<P> {
    fn set_level(&mut self, percent: u8) {
        let percent = percent.min(100);
        self.level = percent;
        let duty = if self.inverted { 100 - percent } else { percent };
        if self.channel.set_duty_cycle_percent(duty).is_err() {
            self.fault = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::pwm::{Error, ErrorKind, ErrorType};

    #[derive(Debug)]
    struct MockError;

    impl Error for MockError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// Mock PWM channel with a 1000-step counter
    struct MockChannel {
        duty: u16,
        broken: bool,
    }

    impl MockChannel {
        fn new() -> Self {
            Self {
                duty: 555,
                broken: false,
            }
        }
    }

    impl ErrorType for MockChannel {
        type Error = MockError;
    }

    impl SetDutyCycle for MockChannel {
        fn max_duty_cycle(&self) -> u16 {
            1000
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), MockError> {
            if self.broken {
                return Err(MockError);
            }
            self.duty = duty;
            Ok(())
        }
    }

    #[test]
    fn test_starts_off() {
        let light = PwmLight::new(MockChannel::new(), false);
        assert_eq!(light.level(), 0);
        assert_eq!(light.release().duty, 0);
    }

    #[test]
    fn test_level_maps_to_duty() {
        let mut light = PwmLight::new(MockChannel::new(), false);
        light.set_level(35);
        assert_eq!(light.channel.duty, 350);
        light.set_level(100);
        assert_eq!(light.channel.duty, 1000);
    }

    #[test]
    fn test_inverted_output() {
        let mut light = PwmLight::new(MockChannel::new(), true);
        assert_eq!(light.channel.duty, 1000);
        light.set_level(100);
        assert_eq!(light.channel.duty, 0);
        light.set_level(25);
        assert_eq!(light.channel.duty, 750);
    }

    #[test]
    fn test_level_is_clamped() {
        let mut light = PwmLight::new(MockChannel::new(), false);
        light.set_level(250);
        assert_eq!(light.level(), 100);
        assert_eq!(light.channel.duty, 1000);
    }

    #[test]
    fn test_write_failure_sets_fault() {
        let mut light = PwmLight::new(MockChannel::new(), false);
        assert!(!light.has_fault());
        light.channel.broken = true;
        light.set_level(50);
        assert!(light.has_fault());
        assert_eq!(light.level(), 50);
    }
}
