//! JSON codec for outbound frames.
//!
//! Each message is encoded once and the resulting text is shared by every
//! session it is broadcast to.

use thiserror::Error;

use crate::messages::ServerMessage;

/// Errors that can occur during message encoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON serialization failed.
    #[error("Failed to serialize message: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// Encode a server message to a JSON string for one WebSocket text frame.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::*;
    use pretty_assertions::assert_eq;
    use webdebug_core::{AnalogReading, LinkStatus, PinRegistry, PinStateStore, SimBoard};

    #[test]
    fn test_encode_snapshot() {
        let board = SimBoard::new();
        let mut store = PinStateStore::new(PinRegistry::esp32(), Box::new(board.gpio())).unwrap();
        store.set_mode(5, true).unwrap();
        store.write(5, true).unwrap();
        store.configure_pwm(18, 1000).unwrap();

        let json = encode_server_message(&ServerMessage::snapshot(&store.snapshot_all())).unwrap();

        assert!(json.starts_with(r#"[{"pin":0,"mode":"INPUT","state":0,"bounce":0},"#));
        assert!(json.contains(r#"{"pin":5,"mode":"OUTPUT","state":1,"bounce":1}"#));
        assert!(json.contains(r#"{"pin":18,"mode":"PWM","state":0,"bounce":0}"#));
        assert!(json.ends_with(r#"{"pin":39,"mode":"INPUT","state":0,"bounce":0}]"#));
    }

    #[test]
    fn test_encode_oscilloscope() {
        let msg = ServerMessage::Oscilloscope(OscilloscopeMessage::from(AnalogReading {
            target_channel: 3,
            smoothed_voltage: 0.99,
        }));
        assert_eq!(
            encode_server_message(&msg).unwrap(),
            r#"{"oscilloscope":{"pin":3,"voltage":0.99}}"#
        );
    }

    #[test]
    fn test_encode_i2c_and_uart() {
        let scan = ServerMessage::I2cScan(I2cScanMessage { i2c: vec![60, 104] });
        assert_eq!(encode_server_message(&scan).unwrap(), r#"{"i2c":[60,104]}"#);

        let empty = ServerMessage::I2cScan(I2cScanMessage { i2c: vec![] });
        assert_eq!(encode_server_message(&empty).unwrap(), r#"{"i2c":[]}"#);

        let uart = ServerMessage::Uart(UartMessage::from_bytes(b"say \"hi\"\n"));
        assert_eq!(
            encode_server_message(&uart).unwrap(),
            r#"{"uart":"say \"hi\"\n"}"#
        );
    }

    #[test]
    fn test_encode_wifi() {
        let link = LinkStatus {
            connected_stations: 1,
            sta_connected: true,
            rssi: -67,
        };
        let msg = ServerMessage::Wifi(WifiMessage::new("ESP32-Debugger", &link));
        assert_eq!(
            encode_server_message(&msg).unwrap(),
            r#"{"wifi":{"mode":"APSTA","ap":{"ssid":"ESP32-Debugger","connected_stations":1},"sta":{"connected":true,"rssi":-67}}}"#
        );
    }

    #[test]
    fn test_encode_error() {
        let msg = ServerMessage::Error(ErrorMessage::new("InvalidPin", "Unknown pin 7"));
        assert_eq!(
            encode_server_message(&msg).unwrap(),
            r#"{"error":{"kind":"InvalidPin","message":"Unknown pin 7"}}"#
        );
    }
}
