//! NTC thermistor probe for the external temperature alarm
//!
//! Circuit: VCC -- pullup -- ADC_PIN -- NTC -- GND
//!
//! Temperature follows the beta equation
//! `1/T = 1/T0 + ln(R/R0)/B` with T in kelvin.

use taillight_core::traits::{SensorError, TemperatureSensor};

/// ADC reading trait for platform abstraction
pub trait AdcReader {
    /// Read a 12-bit sample (0-4095)
    #[allow(clippy::result_unit_err)]
    fn read(&mut self) -> Result<u16, ()>;
}

const ADC_MAX: u16 = 4096;
/// Samples this close to either rail mean a broken probe
const RAIL_MARGIN: u16 = 10;
const KELVIN_OFFSET: f32 = 273.15;
const T0_KELVIN: f32 = 25.0 + KELVIN_OFFSET;

/// Thermistor on an ADC pin with a pull-up to the ADC reference
pub struct NtcThermistor<ADC> {
    adc: ADC,
    pullup_ohms: u32,
    /// Resistance at 25 °C
    r0_ohms: u32,
    beta: u16,
}

impl<ADC> NtcThermistor<ADC> {
    pub fn new(adc: ADC, pullup_ohms: u32, r0_ohms: u32, beta: u16) -> Self {
        Self {
            adc,
            pullup_ohms,
            r0_ohms,
            beta,
        }
    }

    /// The usual 10K B3950 probe behind a 10K pull-up
    pub fn ntc10k(adc: ADC) -> Self {
        Self::new(adc, 10_000, 10_000, 3950)
    }

    /// Thermistor resistance for an ADC sample
    pub fn adc_to_resistance(&self, sample: u16) -> Result<u32, SensorError> {
        if sample >= ADC_MAX - RAIL_MARGIN {
            return Err(SensorError::OpenCircuit);
        }
        if sample < RAIL_MARGIN {
            return Err(SensorError::ShortCircuit);
        }

        let numerator = self.pullup_ohms as u64 * sample as u64;
        let denominator = (ADC_MAX - sample) as u64;
        Ok((numerator / denominator) as u32)
    }

    /// Temperature in 0.1 °C for a thermistor resistance
    pub fn resistance_to_temp_x10(&self, resistance: u32) -> Result<i16, SensorError> {
        if resistance == 0 || self.r0_ohms == 0 || self.beta == 0 {
            return Err(SensorError::OutOfRange);
        }
        let ratio = resistance as f32 / self.r0_ohms as f32;
        let inv_t = 1.0 / T0_KELVIN + libm::logf(ratio) / self.beta as f32;
        if inv_t <= 0.0 {
            return Err(SensorError::OutOfRange);
        }
        let celsius_x10 = (1.0 / inv_t - KELVIN_OFFSET) * 10.0;
        if !(-400.0..=1500.0).contains(&celsius_x10) {
            return Err(SensorError::OutOfRange);
        }
        Ok(libm::roundf(celsius_x10) as i16)
    }
}

impl<ADC: AdcReader> TemperatureSensor for NtcThermistor<ADC> {
    fn read_celsius_x10(&mut self) -> Result<i16, SensorError> {
        let sample = self.adc.read().map_err(|_| SensorError::ConversionError)?;
        let resistance = self.adc_to_resistance(sample)?;
        self.resistance_to_temp_x10(resistance)
    }
}
