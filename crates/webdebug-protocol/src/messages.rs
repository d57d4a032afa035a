//! Outbound message types.
//!
//! Every frame sent to a client is one of these shapes:
//! - Pin snapshot: a bare JSON array of [`PinEntry`]
//! - Analog reading: `{"oscilloscope":{...}}`
//! - Bus scan: `{"i2c":[...]}`
//! - Serial drain: `{"uart":"..."}`
//! - Link status: `{"wifi":{...}}`
//! - Error reply: `{"error":{...}}`, sent to the issuing client only

use serde::{Deserialize, Serialize};
use webdebug_core::{AnalogReading, BridgeError, LinkStatus, PinRecord};

use crate::commands::CommandError;

// ============================================================================
// Pin snapshot
// ============================================================================

/// Mode label shown to clients. PWM is reported for outputs with a nonzero
/// frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModeLabel {
    Input,
    Output,
    Pwm,
}

/// One element of the full pin snapshot.
///
/// ```json
/// {"pin":5,"mode":"OUTPUT","state":1,"bounce":3}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinEntry {
    pub pin: u8,
    pub mode: ModeLabel,
    /// Level as 0 or 1.
    pub state: u8,
    /// Accepted transitions since boot.
    pub bounce: u32,
}

impl From<&PinRecord> for PinEntry {
    fn from(record: &PinRecord) -> Self {
        let mode = if record.is_pwm() {
            ModeLabel::Pwm
        } else if record.is_output() {
            ModeLabel::Output
        } else {
            ModeLabel::Input
        };

        Self {
            pin: record.logical_id,
            mode,
            state: u8::from(record.level),
            bounce: record.change_count,
        }
    }
}

/// Build the snapshot message from records in registry order.
pub fn pin_snapshot(records: &[PinRecord]) -> Vec<PinEntry> {
    records.iter().map(PinEntry::from).collect()
}

// ============================================================================
// Analog reading
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscilloscopeReading {
    /// Client-selected channel label.
    pub pin: i32,
    /// Smoothed voltage rounded to two decimals.
    pub voltage: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscilloscopeMessage {
    pub oscilloscope: OscilloscopeReading,
}

impl From<AnalogReading> for OscilloscopeMessage {
    fn from(reading: AnalogReading) -> Self {
        Self {
            oscilloscope: OscilloscopeReading {
                pin: reading.target_channel,
                voltage: (reading.smoothed_voltage * 100.0).round() / 100.0,
            },
        }
    }
}

// ============================================================================
// Bus scan and serial drain
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct I2cScanMessage {
    /// Responding 7-bit addresses in ascending order.
    pub i2c: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UartMessage {
    pub uart: String,
}

impl UartMessage {
    /// Wrap drained serial bytes. Invalid UTF-8 is replaced, never rejected.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            uart: String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

// ============================================================================
// Link status
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPointStatus {
    pub ssid: String,
    pub connected_stations: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationStatus {
    pub connected: bool,
    pub rssi: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiStatus {
    /// Always `"APSTA"`: the bridge runs an access point and a station.
    pub mode: String,
    pub ap: AccessPointStatus,
    pub sta: StationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiMessage {
    pub wifi: WifiStatus,
}

impl WifiMessage {
    pub fn new(ssid: &str, link: &LinkStatus) -> Self {
        Self {
            wifi: WifiStatus {
                mode: "APSTA".to_string(),
                ap: AccessPointStatus {
                    ssid: ssid.to_string(),
                    connected_stations: link.connected_stations,
                },
                sta: StationStatus {
                    connected: link.sta_connected,
                    rssi: if link.sta_connected { link.rssi } else { 0 },
                },
            },
        }
    }
}

// ============================================================================
// Error reply
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable kind, e.g. `"NotOutput"`.
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: ErrorBody,
}

impl ErrorMessage {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                kind: kind.into(),
                message: message.into(),
            },
        }
    }
}

impl From<&BridgeError> for ErrorMessage {
    fn from(err: &BridgeError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<&CommandError> for ErrorMessage {
    fn from(err: &CommandError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Any message the server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Snapshot(Vec<PinEntry>),
    Oscilloscope(OscilloscopeMessage),
    I2cScan(I2cScanMessage),
    Uart(UartMessage),
    Wifi(WifiMessage),
    Error(ErrorMessage),
}

impl ServerMessage {
    pub fn snapshot(records: &[PinRecord]) -> Self {
        ServerMessage::Snapshot(pin_snapshot(records))
    }
}
