//! DBGp transport: the listener, the frame codec and per-connection
//! command workers.
//!
//! The listener and every connection report to a single
//! `mpsc::Sender<ServerEvent>` owned by the caller.

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod listener;
pub mod wire;

// Re-export primary types for convenience.
pub use config::{DebuggerConfig, FeatureLimits};
pub use connection::{Connection, DebugCommand};
pub use error::{ConnectionError, ServerError};
pub use events::{CommandResult, ConnectionEvent, ConnectionId, ServerEvent};
pub use listener::Listener;
