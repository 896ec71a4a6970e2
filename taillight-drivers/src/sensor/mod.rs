//! Temperature sensors

pub mod ntc;

pub use ntc::{AdcReader, NtcThermistor};
