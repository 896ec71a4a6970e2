//! Board-agnostic core logic for the Taillight RC lighting controller
//!
//! This crate contains everything that does not depend on a specific board:
//!
//! - Signal acquisition: receiver format detection, pulse input, calibration
//! - Logical channels and click-classifying buttons
//! - The animation engine and priority-stacked lights
//! - The vehicle state machine (light modes, brake, turn, sleep, alarms)
//! - The controller tying startup, input routing and the console together
//! - Configuration with dotted-path access
//!
//! Time is passed in explicitly as wrapping `u32` milliseconds, so every
//! component can be driven from host tests.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod animation;
pub mod button;
pub mod channel;
pub mod command;
pub mod config;
pub mod controller;
pub mod input;
pub mod light;
pub mod menu;
pub mod readout;
pub mod traits;
pub mod vehicle;

pub use controller::{Controller, Notice, Notices, Phase};
pub use traits::LightOutput;
pub use vehicle::{Vehicle, VehicleState};
