//! Serial receiver task
//!
//! Forwards raw bytes from a SMART receiver; framing happens in the
//! controller.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embassy_time::Instant;
use embedded_io_async::Read;
use heapless::Vec;

use crate::channels::{InputEvent, EVENTS, SERIAL_CHUNK};

#[embassy_executor::task]
pub async fn serial_rx_task(mut rx: BufferedUartRx) {
    info!("Serial receiver task started");

    let mut buf = [0u8; SERIAL_CHUNK];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) if n > 0 => {
                let at_us = Instant::now().as_micros() as u32;
                trace!("RX: {} bytes", n);
                if let Ok(bytes) = Vec::from_slice(&buf[..n]) {
                    EVENTS.send(InputEvent::Serial { bytes, at_us }).await;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Receiver UART error: {:?}", e);
            }
        }
    }
}
