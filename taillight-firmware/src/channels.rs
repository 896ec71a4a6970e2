//! Inter-task communication channels
//!
//! Every input task feeds [`EVENTS`]; the control task owns the controller
//! and is the only consumer.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::pipe::Pipe;
use embassy_sync::signal::Signal;
use heapless::{String, Vec};

use taillight_core::command::MAX_LINE;
use taillight_core::input::RcMode;

/// Largest chunk of serial receiver bytes per event
pub const SERIAL_CHUNK: usize = 32;

/// Channel capacity for input events
const EVENT_CHANNEL_SIZE: usize = 16;

/// Console output buffer size
const CONSOLE_OUT_SIZE: usize = 256;

/// Input for the control task
pub enum InputEvent {
    /// Idle gap measured on a receiver line during detection (µs)
    Gap { line: usize, gap_us: u32 },
    /// Pulse width measured on a receiver line (µs)
    Pulse { line: usize, width_us: u32 },
    /// Bytes from the serial receiver, stamped at arrival (µs)
    Serial { bytes: Vec<u8, SERIAL_CHUNK>, at_us: u32 },
    /// Complete console line
    Console(String<MAX_LINE>),
}

/// Input events from the capture, serial and console tasks
pub static EVENTS: Channel<CriticalSectionRawMutex, InputEvent, EVENT_CHANNEL_SIZE> = Channel::new();

/// Receiver format and line, once detected or after an abort
pub static DETECTED: Signal<CriticalSectionRawMutex, (RcMode, usize)> = Signal::new();

/// External temperature in °C, or None for a sensor fault
pub static EXT_TEMPERATURE: Signal<CriticalSectionRawMutex, Option<i16>> = Signal::new();

/// Console replies waiting for the UART
pub static CONSOLE_OUT: Pipe<CriticalSectionRawMutex, CONSOLE_OUT_SIZE> = Pipe::new();
