//! Console UART tasks
//!
//! Incoming bytes are split into lines for the control task; replies are
//! drained from [`CONSOLE_OUT`] to the UART.

use defmt::*;
use embassy_rp::uart::{BufferedUartRx, BufferedUartTx};
use embedded_io_async::{Read, Write};

use taillight_core::command::LineBuffer;

use crate::channels::{InputEvent, CONSOLE_OUT, EVENTS};

/// Buffer size for UART transfers
const BUF_SIZE: usize = 64;

#[embassy_executor::task]
pub async fn console_rx_task(mut rx: BufferedUartRx) {
    info!("Console RX task started");

    let mut lines = LineBuffer::new();
    let mut buf = [0u8; BUF_SIZE];

    loop {
        match rx.read(&mut buf).await {
            Ok(n) => {
                for &byte in &buf[..n] {
                    match lines.push(byte) {
                        Some(Ok(line)) => EVENTS.send(InputEvent::Console(line)).await,
                        Some(Err(e)) => {
                            warn!("Console line dropped: {:?}", e);
                            CONSOLE_OUT.write_all(b"ERR\n").await;
                        }
                        None => {}
                    }
                }
            }
            Err(e) => {
                warn!("Console UART error: {:?}", e);
            }
        }
    }
}

#[embassy_executor::task]
pub async fn console_tx_task(mut tx: BufferedUartTx) {
    info!("Console TX task started");

    let mut buf = [0u8; BUF_SIZE];

    loop {
        let n = CONSOLE_OUT.read(&mut buf).await;
        if let Err(e) = tx.write_all(&buf[..n]).await {
            warn!("Console write failed: {:?}", e);
        }
    }
}
