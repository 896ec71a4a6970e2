//! External temperature task
//!
//! Samples the thermistor once a second and publishes the reading for the
//! external temperature alarm.

use defmt::*;
use embassy_rp::adc::{Adc, Blocking, Channel};
use embassy_time::{Duration, Ticker};

use taillight_core::traits::{SensorError, TemperatureSensor};
use taillight_drivers::sensor::{AdcReader, NtcThermistor};

use crate::channels::EXT_TEMPERATURE;

/// Sampling interval in milliseconds
const SAMPLE_INTERVAL_MS: u64 = 1000;

/// ADC0 with the thermistor channel
pub struct ThermistorAdc {
    adc: Adc<'static, Blocking>,
    channel: Channel<'static>,
}

impl ThermistorAdc {
    pub fn new(adc: Adc<'static, Blocking>, channel: Channel<'static>) -> Self {
        Self { adc, channel }
    }
}

impl AdcReader for ThermistorAdc {
    fn read(&mut self) -> Result<u16, ()> {
        self.adc.blocking_read(&mut self.channel).map_err(|_| ())
    }
}

#[embassy_executor::task]
pub async fn temperature_task(mut sensor: NtcThermistor<ThermistorAdc>) {
    info!("Temperature task started");

    let mut ticker = Ticker::every(Duration::from_millis(SAMPLE_INTERVAL_MS));
    let mut last_error: Option<SensorError> = None;

    loop {
        ticker.next().await;

        let reading = match sensor.read_celsius() {
            Ok(celsius) => {
                if last_error.take().is_some() {
                    info!("External temperature sensor recovered");
                }
                Some(celsius)
            }
            Err(e) => {
                if last_error != Some(e) {
                    warn!("External temperature sensor: {:?}", e);
                }
                last_error = Some(e);
                None
            }
        };

        EXT_TEMPERATURE.signal(reading);
    }
}
