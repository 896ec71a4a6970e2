//! Hardware abstraction traits
//!
//! These traits define the interface between the control logic and the
//! board-specific drivers.

pub mod light;
pub mod sensor;

pub use light::LightOutput;
pub use sensor::{SensorError, TemperatureSensor};
