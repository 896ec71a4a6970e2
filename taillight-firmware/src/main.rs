//! Taillight - RC Vehicle Lighting Controller Firmware
//!
//! Main firmware binary for RP2040-based light controllers. Detects the
//! receiver format at boot, then drives the light outputs from the
//! receiver channels and ESC telemetry.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel as AdcChannel};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::{UART0, UART1};
use embassy_rp::pwm::{Config as PwmConfig, Pwm, PwmOutput};
use embassy_rp::uart::{BufferedInterruptHandler, BufferedUartRx, Config as UartConfig, Uart};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use taillight_core::config::{text, Config, LightConfig};
use taillight_core::input::RcMode;
use taillight_core::Controller;
use taillight_drivers::light::{DigitalLight, PwmLight};
use taillight_drivers::sensor::NtcThermistor;

use crate::board::{Light, LIGHT_COUNT, RECEIVER_LINES, SERIAL_LINE};

mod board;
mod channels;
mod tasks;

/// Embedded vehicle configuration (compiled into firmware)
/// Edit vehicle.cfg and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../vehicle.cfg");

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    UART1_IRQ => BufferedInterruptHandler<UART1>;
});

// Static cells for UART buffers (must live forever)
static CONSOLE_TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static CONSOLE_RX_BUF: StaticCell<[u8; 128]> = StaticCell::new();
static SERIAL_RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Taillight firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();

    // Light outputs
    let mut pwm_config = PwmConfig::default();
    pwm_config.top = board::PWM_TOP;
    pwm_config.divider = board::PWM_DIVIDER.into();

    let (head, tail) = Pwm::new_output_ab(p.PWM_SLICE1, p.PIN_2, p.PIN_3, pwm_config.clone()).split();
    let (left, _) = Pwm::new_output_a(p.PWM_SLICE2, p.PIN_4, pwm_config.clone()).split();
    let (right, roof) = Pwm::new_output_ab(p.PWM_SLICE3, p.PIN_6, p.PIN_7, pwm_config).split();

    let mut lights: heapless::Vec<Light, LIGHT_COUNT> = heapless::Vec::new();
    for output in [head, tail, left, right, roof] {
        match output {
            Some(output) => {
                let _ = lights.push(pwm_light(output));
            }
            None => error!("PWM output missing"),
        }
    }
    let status = Light::from(DigitalLight::new(Output::new(p.PIN_25, Level::Low), false));
    info!("{} light outputs initialized", lights.len());

    let controller = Controller::new(config, lights, status, RECEIVER_LINES);
    let button = Input::new(p.PIN_14, Pull::Up);

    // Console
    let mut console_config = UartConfig::default();
    console_config.baudrate = board::CONSOLE_BAUD;
    let console = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, console_config).into_buffered(
        Irqs,
        CONSOLE_TX_BUF.init([0u8; 256]),
        CONSOLE_RX_BUF.init([0u8; 128]),
    );
    let (console_tx, console_rx) = console.split();
    info!("Console UART initialized");

    // External thermistor on ADC0
    let adc = Adc::new_blocking(p.ADC, Default::default());
    let thermistor = AdcChannel::new_pin(p.PIN_26, Pull::None);
    let sensor = NtcThermistor::new(
        tasks::ThermistorAdc::new(adc, thermistor),
        board::THERMISTOR_PULLUP_OHMS,
        10_000,
        3950,
    );

    spawner.spawn(tasks::control_task(controller, button)).unwrap();
    spawner.spawn(tasks::console_rx_task(console_rx)).unwrap();
    spawner.spawn(tasks::console_tx_task(console_tx)).unwrap();
    spawner.spawn(tasks::temperature_task(sensor)).unwrap();

    // Receiver lines are plain inputs until the format is known
    let mut line0 = p.PIN_9;
    let mut line1 = p.PIN_10;
    let mut line2 = p.PIN_11;

    let (mode, line) = {
        let mut inputs = [
            Input::new(line0.reborrow(), Pull::None),
            Input::new(line1.reborrow(), Pull::None),
            Input::new(line2.reborrow(), Pull::None),
        ];
        tasks::detect(&mut inputs).await
    };

    match mode {
        RcMode::Smart => {
            if line != SERIAL_LINE {
                warn!("Serial receiver found on line {}, expected line {}", line, SERIAL_LINE);
            }
            let mut serial_config = UartConfig::default();
            serial_config.baudrate = board::SERIAL_BAUD;
            let rx = BufferedUartRx::new(p.UART1, Irqs, line0, SERIAL_RX_BUF.init([0u8; 256]), serial_config);
            spawner.spawn(tasks::serial_rx_task(rx)).unwrap();
        }
        RcMode::Pwm => {
            spawner.spawn(tasks::pulse_task(0, Input::new(line0, Pull::Down))).unwrap();
            spawner.spawn(tasks::pulse_task(1, Input::new(line1, Pull::Down))).unwrap();
            spawner.spawn(tasks::pulse_task(2, Input::new(line2, Pull::Down))).unwrap();
        }
    }

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

fn pwm_light(output: PwmOutput<'static>) -> Light {
    Light::from(PwmLight::new(output, false))
}

/// Built-in defaults with vehicle.cfg applied on top
///
/// Every board light gets a slot first so the file can address it.
fn load_config() -> Config {
    let mut config = Config::default();
    while config.lights.len() < LIGHT_COUNT {
        let _ = config.lights.push(LightConfig::default());
    }

    let applied = text::apply(&mut config, EMBEDDED_CONFIG, |line, e| {
        warn!("vehicle.cfg line {}: {:?}", line, e);
    });
    info!("Configuration loaded ({} values)", applied);
    config
}
