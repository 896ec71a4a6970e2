//! Control loop task
//!
//! Owns the controller. Input events are applied as they arrive; every
//! tick polls the push button, picks up the latest external temperature
//! and advances the vehicle and its animations.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_rp::gpio::Input;
use embassy_time::{Duration, Instant, Ticker};
use heapless::String;

use taillight_core::{Controller, Notice, Notices};

use crate::board::{Light, SERIAL_LINE};
use crate::channels::{InputEvent, CONSOLE_OUT, DETECTED, EVENTS, EXT_TEMPERATURE};

/// Control tick interval in milliseconds
pub const TICK_INTERVAL_MS: u64 = 10;

/// Console reply buffer; large enough for a full DUMPCONFIG
const REPLY_SIZE: usize = 4096;

fn now_ms() -> u32 {
    Instant::now().as_millis() as u32
}

#[embassy_executor::task]
pub async fn control_task(mut controller: Controller<Light>, button: Input<'static>) {
    info!("Control task started");

    let mut ticker = Ticker::every(Duration::from_millis(TICK_INTERVAL_MS));
    let mut reply: String<REPLY_SIZE> = String::new();
    let mut fault_reported = false;

    loop {
        match select(ticker.next(), EVENTS.receive()).await {
            Either::First(()) => {
                let now = now_ms();

                if let Some(celsius) = EXT_TEMPERATURE.try_take() {
                    controller.vehicle_mut().set_external_temperature(celsius);
                }

                let notices = controller.hardware_button(button.is_low(), now);
                report(&controller, notices);
                let notices = controller.tick(now);
                report(&controller, notices);

                if !fault_reported && has_output_fault(&controller) {
                    error!("Light output rejected a write");
                    fault_reported = true;
                }
            }
            Either::Second(event) => match event {
                InputEvent::Gap { line, gap_us } => {
                    if let Some(notice) = controller.observe_gap(line, gap_us) {
                        report(&controller, Notices::from_iter([notice]));
                    }
                }
                InputEvent::Pulse { line, width_us } => {
                    controller.record_pulse(line, width_us);
                }
                InputEvent::Serial { bytes, at_us } => {
                    let notices = controller.receive(&bytes, at_us, now_ms());
                    report(&controller, notices);
                }
                InputEvent::Console(line) => {
                    reply.clear();
                    if let Some(notice) = controller.handle_line(&line, now_ms(), &mut reply) {
                        log_notice(notice);
                    }
                    CONSOLE_OUT.write_all(reply.as_bytes()).await;
                }
            },
        }
    }
}

/// Log notices and release the capture side once the format is settled
fn report(controller: &Controller<Light>, notices: Notices) {
    for notice in notices {
        if let Notice::ModeDetected(mode) | Notice::DetectionAborted(mode) = notice {
            let line = controller.detected_line().unwrap_or(SERIAL_LINE);
            DETECTED.signal((mode, line));
        }
        log_notice(notice);
    }
}

fn log_notice(notice: Notice) {
    match notice {
        Notice::ModeDetected(mode) => info!("Receiver detected: {:?}", mode),
        Notice::DetectionAborted(mode) => warn!("Detection aborted, assuming {:?}", mode),
        Notice::CalibrationComplete => info!("Calibration complete"),
        Notice::CalibrationRestarted => warn!("Calibration restarted"),
        Notice::FrameDropped(e) => debug!("Frame dropped: {:?}", e),
        Notice::LightMode(mode) => info!("Light mode: {:?}", mode),
        Notice::Sleeping => info!("Sleeping"),
        Notice::Awake => info!("Awake"),
        Notice::Focus(focus) => debug!("Focus: {:?}", focus),
        Notice::CommandRejected(e) => warn!("Command rejected: {:?}", e),
    }
}

fn has_output_fault(controller: &Controller<Light>) -> bool {
    let vehicle = controller.vehicle();
    vehicle.status().output().has_fault() || vehicle.lights().iter().any(|l| l.output().has_fault())
}
