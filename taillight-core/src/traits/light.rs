//! Light output trait

/// A physical light output
///
/// Implementations map a brightness percentage onto their hardware: a PWM
/// duty cycle, or on/off for plain digital outputs. One output may drive
/// several pins that share a duty cycle.
pub trait LightOutput {
    /// Drive the output at `percent` (0-100)
    fn set_level(&mut self, percent: u8);
}

impl<T: LightOutput + ?Sized> LightOutput for &mut T {
    fn set_level(&mut self, percent: u8) {
        (**self).set_level(percent)
    }
}

/// Two outputs driven as one, e.g. a light split across two pins
impl<A: LightOutput, B: LightOutput> LightOutput for (A, B) {
    fn set_level(&mut self, percent: u8) {
        self.0.set_level(percent);
        self.1.set_level(percent);
    }
}
