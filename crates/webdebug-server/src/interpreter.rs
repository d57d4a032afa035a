//! Command interpreter.
//!
//! Parses one inbound frame, applies it to the shared state and decides what
//! gets broadcast:
//!
//! | Command | Broadcast |
//! |---|---|
//! | `MODE`, `WRITE`, `PWM` | full pin snapshot, also when the store rejected the change |
//! | `OSCILLO`, `UART_SEND` | nothing |
//! | `I2C_SCAN` | `{"i2c":[...]}` |
//! | `UART_READ` | `{"uart":"..."}` |
//!
//! Errors are answered to the issuing session only.

use std::sync::Arc;

use tracing::{debug, warn};

use webdebug_core::{BridgeError, HardwareError, SessionId};
use webdebug_protocol::{
    parse_command, Command, ErrorMessage, I2cScanMessage, ServerMessage, UartMessage,
};

use crate::state::BridgeState;

/// What a successfully executed command asks the fan-out to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    None,
    Snapshot,
    Broadcast(ServerMessage),
}

/// Executes client commands against the shared state.
#[derive(Debug, Clone)]
pub struct CommandInterpreter {
    state: Arc<BridgeState>,
}

impl CommandInterpreter {
    pub fn new(state: Arc<BridgeState>) -> Self {
        Self { state }
    }

    /// Handle one text frame received from `session`.
    pub async fn handle(&self, session: SessionId, text: &str) {
        let command = match parse_command(text, self.state.settings.strict_commands) {
            Ok(command) => command,
            Err(e) => {
                debug!("Session {} sent unparsable frame {:?}: {}", session, text, e);
                self.reply(session, ServerMessage::Error(ErrorMessage::from(&e)))
                    .await;
                return;
            }
        };

        debug!("Session {} -> {}", session, command.name());
        let touches_pins = matches!(
            command,
            Command::Mode { .. } | Command::Write { .. } | Command::Pwm { .. }
        );

        match self.execute(command).await {
            Ok(reaction) => self.react(reaction).await,
            Err(e) => {
                warn!("Command from session {} rejected: {}", session, e);
                self.reply(session, ServerMessage::Error(ErrorMessage::from(&e)))
                    .await;
                if touches_pins {
                    self.state.broadcast_snapshot().await;
                }
            }
        }
    }

    /// Apply a parsed command to the shared state.
    pub async fn execute(&self, command: Command) -> Result<Reaction, BridgeError> {
        match command {
            Command::Mode { pin, output } => {
                if let Some(output) = output {
                    self.state.pins.lock().await.set_mode(pin, output)?;
                }
                Ok(Reaction::Snapshot)
            }
            Command::Write { pin, value } => {
                self.state.pins.lock().await.write(pin, value)?;
                Ok(Reaction::Snapshot)
            }
            Command::Pwm { pin, frequency_hz } => {
                self.state
                    .pins
                    .lock()
                    .await
                    .configure_pwm(pin, frequency_hz)?;
                Ok(Reaction::Snapshot)
            }
            Command::Oscillo { channel } => {
                self.state.analog.lock().await.set_target_channel(channel);
                Ok(Reaction::None)
            }
            Command::UartSend(text) => {
                let written = self.state.serial.lock().await.write_bytes(text.as_bytes())?;
                debug!("Serial: wrote {} of {} bytes", written, text.len());
                Ok(Reaction::None)
            }
            Command::I2cScan => {
                let addresses = self.scan_bus().await?;
                Ok(Reaction::Broadcast(ServerMessage::I2cScan(I2cScanMessage {
                    i2c: addresses,
                })))
            }
            Command::UartRead => {
                let limit = self.state.settings.serial_read_limit;
                let bytes = self.state.serial.lock().await.read_available(limit)?;
                Ok(Reaction::Broadcast(ServerMessage::Uart(
                    UartMessage::from_bytes(&bytes),
                )))
            }
        }
    }

    /// Probe the bus on the blocking pool; a full scan can take a while on
    /// real hardware.
    async fn scan_bus(&self) -> Result<Vec<u8>, BridgeError> {
        let mut bus = Arc::clone(&self.state.bus).lock_owned().await;
        let addresses = tokio::task::spawn_blocking(move || bus.scan())
            .await
            .map_err(|e| HardwareError::Bus(e.to_string()))?;
        debug!("Bus scan found {} devices", addresses.len());
        Ok(addresses)
    }

    async fn react(&self, reaction: Reaction) {
        match reaction {
            Reaction::None => {}
            Reaction::Snapshot => self.state.broadcast_snapshot().await,
            Reaction::Broadcast(msg) => {
                self.state.fanout.broadcast(&msg).await;
            }
        }
    }

    async fn reply(&self, session: SessionId, msg: ServerMessage) {
        if let Err(e) = self.state.fanout.send_to(session, &msg).await {
            debug!("Reply to session {} not delivered: {}", session, e);
        }
    }
}
