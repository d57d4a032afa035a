//! Demo stimulus for the simulated board.
//!
//! Drives a few input pins (with contact bounce), sweeps the ADC, feeds the
//! serial receive buffer and reports a changing link, so a client connected
//! to the hosted bridge has something to watch.

use std::time::Duration;

use webdebug_core::{LinkStatus, SimBoard};

/// Inputs toggled by the stimulus.
const DEMO_INPUTS: [u8; 3] = [4, 26, 34];

/// I2C addresses of the simulated devices.
const DEMO_DEVICES: [u8; 2] = [0x3C, 0x76];

pub fn attach_demo_devices(board: &SimBoard) {
    for address in DEMO_DEVICES {
        board.attach_bus_device(address);
    }
    board.set_link(LinkStatus {
        connected_stations: 1,
        sta_connected: true,
        rssi: -58,
    });
}

/// Raw ADC value of a slow triangle sweep at step `n`.
fn sweep(n: u32) -> u16 {
    let phase = (n % 80) as i32;
    let ramp = if phase < 40 { phase } else { 80 - phase };
    (ramp * 4095 / 40) as u16
}

/// Run the stimulus forever.
pub async fn generate_demo_stimulus(board: SimBoard) {
    let mut interval = tokio::time::interval(Duration::from_millis(250));
    let mut step: u32 = 0;

    loop {
        interval.tick().await;
        step = step.wrapping_add(1);

        board.set_adc_raw(sweep(step));

        if step % 8 == 0 {
            let pin = DEMO_INPUTS[(step / 8) as usize % DEMO_INPUTS.len()];
            let level = !board.input(pin);
            // A short bounce before settling on the new level.
            board.set_input(pin, level);
            tokio::time::sleep(Duration::from_millis(2)).await;
            board.set_input(pin, !level);
            tokio::time::sleep(Duration::from_millis(2)).await;
            board.set_input(pin, level);
        }

        if step % 20 == 0 {
            board.push_serial_rx(format!("tick {}\r\n", step / 20).as_bytes());
            board.set_link(LinkStatus {
                connected_stations: (step / 20) % 3,
                sta_connected: true,
                rssi: -50 - ((step / 20) % 20) as i32,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_bounds() {
        assert_eq!(sweep(0), 0);
        assert_eq!(sweep(40), 4095);
        assert_eq!(sweep(80), 0);
        assert!((0..200).all(|n| sweep(n) <= 4095));
    }

    #[test]
    fn test_demo_devices() {
        let board = SimBoard::new();
        attach_demo_devices(&board);
        assert_eq!(
            webdebug_core::BusScanner::scan(&mut board.bus()),
            vec![0x3C, 0x76]
        );
    }
}
