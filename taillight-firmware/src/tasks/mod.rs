//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod capture;
pub mod console;
pub mod control;
pub mod serial;
pub mod temperature;

pub use capture::{detect, pulse_task};
pub use console::{console_rx_task, console_tx_task};
pub use control::control_task;
pub use serial::serial_rx_task;
pub use temperature::{temperature_task, ThermistorAdc};
