//! Hardware driver implementations
//!
//! Concrete implementations of the traits defined in taillight-core, written
//! against `embedded-hal` 1.0 so any HAL can supply the pins:
//!
//! - Light outputs (PWM dimmed, plain digital)
//! - Temperature sensors (NTC thermistor)

#![no_std]
#![deny(unsafe_code)]

pub mod light;
pub mod sensor;
