//! # webdebug-protocol
//!
//! Wire formats of the webdebug bridge.
//!
//! Clients send short textual commands (`WRITE:5,1`, `I2C_SCAN`, ...) and
//! receive one JSON value per WebSocket text frame.

pub mod codec;
pub mod commands;
pub mod messages;

pub use codec::{encode_server_message, CodecError};
pub use commands::{parse_command, Command, CommandError};
pub use messages::*;
