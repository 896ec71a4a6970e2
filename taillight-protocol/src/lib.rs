//! Receiver link protocol
//!
//! This crate decodes the binary stream sent by "smart" RC receivers: a
//! sequence of length-prefixed frames carrying either channel data from the
//! transmitter or telemetry from devices on the bus (ESC).
//!
//! # Frame Overview
//!
//! ```text
//! ┌──────┬──────┬────────┬──────────────────────────────┐
//! │ SYNC │ TYPE │ LENGTH │ PAYLOAD                      │
//! │ 0xA6 │ 1B   │ 1B     │ LENGTH - 3 bytes             │
//! └──────┴──────┴────────┴──────────────────────────────┘
//! ```
//!
//! `LENGTH` counts the whole frame including the three header bytes.
//! Decoding is a pure function over a byte slice; buffering and stale-frame
//! handling live in [`FrameReceiver`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod control;
pub mod frame;
pub mod receiver;
pub mod telemetry;

pub use control::{pulse_equivalent, ChannelMap, ControlFrame, MAX_CHANNELS};
pub use frame::{parse, FrameError, Packet, MAX_FRAME_SIZE, SYNC_BYTE};
pub use receiver::{FrameReceiver, STALE_FRAME_US};
pub use telemetry::{EscTelemetry, TelemetryData, TelemetryRecord, DEVICE_ESC};
