//! Board pin map
//!
//! RP2040 board with three receiver inputs, five PWM light outputs, a
//! status LED and one push button:
//!
//! | Function                  | Pin     | Peripheral          |
//! |---------------------------|---------|---------------------|
//! | Console TX / RX           | GPIO0/1 | UART0               |
//! | Head light                | GPIO2   | PWM slice 1 A       |
//! | Tail / brake light        | GPIO3   | PWM slice 1 B       |
//! | Left indicator            | GPIO4   | PWM slice 2 A       |
//! | Right indicator           | GPIO6   | PWM slice 3 A       |
//! | Roof bar                  | GPIO7   | PWM slice 3 B       |
//! | Receiver line 0 (CH1/RX)  | GPIO9   | GPIO, then UART1 RX |
//! | Receiver line 1 (CH2)     | GPIO10  | GPIO                |
//! | Receiver line 2 (CH3)     | GPIO11  | GPIO                |
//! | Push button (active low)  | GPIO14  | GPIO                |
//! | Status LED                | GPIO25  | GPIO                |
//! | External thermistor       | GPIO26  | ADC0                |
//!
//! A serial receiver must be connected to line 0, the only line with a
//! UART behind it.

use embassy_rp::gpio::Output;
use embassy_rp::pwm::PwmOutput;
use taillight_drivers::light::LightDriver;

/// Receiver input lines
pub const RECEIVER_LINES: usize = 3;

/// Input line wired to UART1 RX
pub const SERIAL_LINE: usize = 0;

/// Light outputs, excluding the status LED
pub const LIGHT_COUNT: usize = 5;

/// Light output frequency (Hz)
pub const PWM_FREQUENCY_HZ: u32 = 1000;

/// PWM counter wrap for [`PWM_FREQUENCY_HZ`] at 125 MHz with divider 125
pub const PWM_TOP: u16 = (125_000_000 / 125 / PWM_FREQUENCY_HZ - 1) as u16;

pub const PWM_DIVIDER: u8 = 125;

/// Serial receiver baud rate
pub const SERIAL_BAUD: u32 = 115_200;

/// Console baud rate
pub const CONSOLE_BAUD: u32 = 115_200;

/// Thermistor divider pull-up (Ω)
pub const THERMISTOR_PULLUP_OHMS: u32 = 10_000;

/// One light output on this board
pub type Light = LightDriver<PwmOutput<'static>, Output<'static>>;
