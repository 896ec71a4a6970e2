//! Receiver line capture
//!
//! Before the format is known every line is watched for idle gaps; after a
//! pulse receiver is detected, one task per line measures pulse widths.

use defmt::*;
use embassy_futures::select::{select, select_array, Either};
use embassy_rp::gpio::Input;
use embassy_time::Instant;

use taillight_core::input::{PulseInput, RcMode};

use crate::board::RECEIVER_LINES;
use crate::channels::{InputEvent, DETECTED, EVENTS};

/// Length of the next low period on `input` (µs)
async fn low_period(input: &mut Input<'_>) -> u32 {
    input.wait_for_falling_edge().await;
    let start = Instant::now();
    input.wait_for_rising_edge().await;
    start.elapsed().as_micros() as u32
}

/// Feed idle gaps from every line to the controller until it decides
///
/// Returns the detected (or fallback) format and the line it was seen on.
pub async fn detect(lines: &mut [Input<'_>; RECEIVER_LINES]) -> (RcMode, usize) {
    info!("Detecting receiver on {} lines", RECEIVER_LINES);
    loop {
        let measurements = lines.each_mut().map(low_period);
        match select(DETECTED.wait(), select_array(measurements)).await {
            Either::First(detected) => return detected,
            Either::Second((gap_us, line)) => {
                EVENTS.send(InputEvent::Gap { line, gap_us }).await;
            }
        }
    }
}

/// Pulse capture, one task per receiver line
#[embassy_executor::task(pool_size = 3)]
pub async fn pulse_task(line: usize, mut input: Input<'static>) {
    info!("Pulse capture started on line {}", line);

    loop {
        input.wait_for_rising_edge().await;
        let start = Instant::now();
        input.wait_for_falling_edge().await;
        let width_us = start.elapsed().as_micros() as u32;

        if PulseInput::accepts(width_us) {
            EVENTS.send(InputEvent::Pulse { line, width_us }).await;
        } else {
            trace!("Line {}: dropped {} us pulse", line, width_us);
        }
    }
}
