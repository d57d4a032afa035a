//! Inbound command grammar.
//!
//! Commands are case-sensitive text frames: a prefix, `:` and comma separated
//! fields. Argument-less commands must match exactly.
//!
//! ```text
//! MODE:<pin>,<OUTPUT|other>    WRITE:<pin>,<0|1>    PWM:<pin>,<freq>
//! OSCILLO:<channel>            UART_SEND:<text>     I2C_SCAN    UART_READ
//! ```
//!
//! Numeric fields are parsed in one of two ways. Permissive parsing reads
//! the leading integer of the field the way C `atoi` does, so `"12abc"` is 12
//! and `"abc"` is 0. Strict parsing requires the whole field to be an
//! integer and reports anything else as [`CommandError::InvalidNumber`].

use thiserror::Error;

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Switch a pin's direction. `None` leaves the mode untouched (permissive
    /// parsing of a frame without a mode field).
    Mode { pin: i32, output: Option<bool> },
    /// Drive an output pin.
    Write { pin: i32, value: bool },
    /// Start PWM on a pin; 0 Hz disables it.
    Pwm { pin: i32, frequency_hz: u32 },
    /// Relabel the analog reading.
    Oscillo { channel: i32 },
    /// Bytes to transmit on the serial line, verbatim.
    UartSend(String),
    I2cScan,
    UartRead,
}

impl Command {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Mode { .. } => "MODE",
            Command::Write { .. } => "WRITE",
            Command::Pwm { .. } => "PWM",
            Command::Oscillo { .. } => "OSCILLO",
            Command::UartSend(_) => "UART_SEND",
            Command::I2cScan => "I2C_SCAN",
            Command::UartRead => "UART_READ",
        }
    }
}

/// Errors from parsing a command frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command} is missing the {field} field")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },

    #[error("Invalid number for {field}: {text:?}")]
    InvalidNumber { field: &'static str, text: String },
}

impl CommandError {
    /// Short machine-readable kind, used in error replies to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::UnknownCommand(_) => "UnknownCommand",
            CommandError::MissingField { .. } => "MissingField",
            CommandError::InvalidNumber { .. } => "InvalidNumber",
        }
    }
}

// ============================================================================
// Field parsing
// ============================================================================

/// Leading-integer parse: optional whitespace and sign, then digits up to
/// the first non-digit. No digits yields 0; out-of-range values saturate.
fn leading_int(text: &str) -> i32 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for byte in digits.bytes().take_while(u8::is_ascii_digit) {
        value = (value * 10 + i64::from(byte - b'0')).min(i64::from(i32::MAX) + 1);
    }
    if negative {
        value = -value;
    }
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn int_field(text: &str, field: &'static str, strict: bool) -> Result<i32, CommandError> {
    if !strict {
        return Ok(leading_int(text));
    }
    text.trim().parse().map_err(|_| CommandError::InvalidNumber {
        field,
        text: text.to_string(),
    })
}

/// Split `"<a>,<b>"` at the first comma.
fn two_fields<'a>(
    args: &'a str,
    command: &'static str,
    second: &'static str,
) -> Result<(&'a str, &'a str), CommandError> {
    args.split_once(',').ok_or(CommandError::MissingField {
        command,
        field: second,
    })
}

// ============================================================================
// Commands
// ============================================================================

fn parse_mode(args: &str, strict: bool) -> Result<Command, CommandError> {
    match args.split_once(',') {
        Some((pin, mode)) => {
            let pin = int_field(pin, "pin", strict)?;
            // Permissive parsing looks for OUTPUT anywhere in the mode field.
            let output = if strict {
                mode.trim() == "OUTPUT"
            } else {
                mode.contains("OUTPUT")
            };
            Ok(Command::Mode {
                pin,
                output: Some(output),
            })
        }
        None if strict => Err(CommandError::MissingField {
            command: "MODE",
            field: "mode",
        }),
        None => Ok(Command::Mode {
            pin: leading_int(args),
            output: None,
        }),
    }
}

fn parse_write(args: &str, strict: bool) -> Result<Command, CommandError> {
    let (pin, value) = two_fields(args, "WRITE", "value")?;
    let pin = int_field(pin, "pin", strict)?;
    let value = int_field(value, "value", strict)?;
    if strict && !matches!(value, 0 | 1) {
        return Err(CommandError::InvalidNumber {
            field: "value",
            text: value.to_string(),
        });
    }
    Ok(Command::Write {
        pin,
        value: value != 0,
    })
}

fn parse_pwm(args: &str, strict: bool) -> Result<Command, CommandError> {
    let (pin, frequency) = two_fields(args, "PWM", "frequency")?;
    let pin = int_field(pin, "pin", strict)?;
    let frequency = int_field(frequency, "frequency", strict)?;
    let frequency_hz = match u32::try_from(frequency) {
        Ok(hz) => hz,
        Err(_) if strict => {
            return Err(CommandError::InvalidNumber {
                field: "frequency",
                text: frequency.to_string(),
            })
        }
        Err(_) => 0,
    };
    Ok(Command::Pwm { pin, frequency_hz })
}

/// Parse one inbound text frame.
///
/// `strict` selects strict numeric parsing (see the module docs).
pub fn parse_command(text: &str, strict: bool) -> Result<Command, CommandError> {
    match text {
        "I2C_SCAN" => return Ok(Command::I2cScan),
        "UART_READ" => return Ok(Command::UartRead),
        _ => {}
    }

    if let Some(args) = text.strip_prefix("MODE:") {
        parse_mode(args, strict)
    } else if let Some(args) = text.strip_prefix("WRITE:") {
        parse_write(args, strict)
    } else if let Some(args) = text.strip_prefix("PWM:") {
        parse_pwm(args, strict)
    } else if let Some(args) = text.strip_prefix("OSCILLO:") {
        Ok(Command::Oscillo {
            channel: int_field(args, "channel", strict)?,
        })
    } else if let Some(payload) = text.strip_prefix("UART_SEND:") {
        Ok(Command::UartSend(payload.to_string()))
    } else {
        Err(CommandError::UnknownCommand(text.to_string()))
    }
}
