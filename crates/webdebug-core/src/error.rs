//! Error types shared by the core components.

use thiserror::Error;

use crate::session::SessionId;

/// Failure reported by a raw peripheral primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    /// Reading a digital level failed.
    #[error("GPIO{pin} read failed: {reason}")]
    Read { pin: u8, reason: String },

    /// Driving a digital level failed.
    #[error("GPIO{pin} write failed: {reason}")]
    Write { pin: u8, reason: String },

    /// Reconfiguring direction or PWM failed.
    #[error("GPIO{pin} configuration failed: {reason}")]
    Configure { pin: u8, reason: String },

    /// Sampling the analog channel failed.
    #[error("ADC channel {channel} read failed: {reason}")]
    Analog { channel: u8, reason: String },

    /// Serial port failure.
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Bus transaction failure.
    #[error("Bus error: {0}")]
    Bus(String),
}

/// Errors produced by the pin store and session registry.
///
/// Every variant is local to the operation that produced it; none of them
/// stops the periodic tasks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The logical pin id is not in the registry.
    #[error("Unknown pin {0}")]
    InvalidPin(i32),

    /// A write was attempted on a pin that is not in output mode.
    #[error("GPIO{0} is not configured as an output")]
    NotOutput(u8),

    /// No free session slot.
    #[error("Session registry full ({capacity} sessions)")]
    RegistryFull { capacity: usize },

    /// Delivering a frame to one session failed.
    #[error("Transport failure on session {0}")]
    TransportFailure(SessionId),

    /// The underlying peripheral call failed.
    #[error(transparent)]
    Hardware(#[from] HardwareError),
}

impl BridgeError {
    /// Short machine-readable kind, used in error replies to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::InvalidPin(_) => "InvalidPin",
            BridgeError::NotOutput(_) => "NotOutput",
            BridgeError::RegistryFull { .. } => "RegistryFull",
            BridgeError::TransportFailure(_) => "TransportFailure",
            BridgeError::Hardware(_) => "Hardware",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(BridgeError::InvalidPin(3).kind(), "InvalidPin");
        assert_eq!(BridgeError::NotOutput(5).kind(), "NotOutput");
        assert_eq!(BridgeError::RegistryFull { capacity: 8 }.kind(), "RegistryFull");
    }

    #[test]
    fn test_hardware_error_is_transparent() {
        let err: BridgeError = HardwareError::Serial("port closed".to_string()).into();
        assert_eq!(err.to_string(), "Serial port error: port closed");
        assert_eq!(err.kind(), "Hardware");
    }
}
