//! Temperature sensor trait
//!
//! The external temperature alarm reads its value through this trait; the
//! ESC temperature arrives with the telemetry frames instead.

/// Sensor read failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Sensor disconnected
    OpenCircuit,
    /// Sensor shorted to ground
    ShortCircuit,
    /// Reading outside the range the sensor can report
    OutOfRange,
    /// The ADC read failed
    ConversionError,
}

/// A temperature sensor
pub trait TemperatureSensor {
    /// Read the temperature in 0.1 °C steps (455 = 45.5 °C)
    fn read_celsius_x10(&mut self) -> Result<i16, SensorError>;

    /// Read the temperature in whole degrees Celsius
    fn read_celsius(&mut self) -> Result<i16, SensorError> {
        self.read_celsius_x10().map(|t| t / 10)
    }
}
