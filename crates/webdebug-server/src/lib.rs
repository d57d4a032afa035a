//! # webdebug-server
//!
//! tokio runtime for the webdebug bridge: WebSocket sessions, broadcast
//! fan-out, the command interpreter and the periodic producers.

pub mod fanout;
pub mod interpreter;
pub mod server;
pub mod state;
pub mod tasks;

pub use fanout::{Fanout, SessionOutbox};
pub use interpreter::{CommandInterpreter, Reaction};
pub use server::{BridgeServer, ServerConfig};
pub use state::{BridgeState, Peripherals, StateError};
pub use tasks::{
    debounce_tick, link_status_tick, oscilloscope_tick, spawn_periodic_tasks, PeriodicTasks,
};

pub use webdebug_core::{BridgeSettings, SimBoard};
