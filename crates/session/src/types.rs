//! Public types for the session orchestrator.

use std::net::SocketAddr;

use serde::Serialize;

use xdbg_protocol::{
    Breakpoint, CommandOutcome, ContextVariables, ContinuationMessage, InitMessage, StackFrame,
    Variable,
};
use xdbg_server::ConnectionId;

/// Lifecycle of a debug session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Not listening.
    Idle,
    /// Listening, no engine attached.
    WaitingForConnection,
    /// An engine connection is current.
    Debugging,
    /// The current connection was asked to stop or detach.
    Stopping,
}

/// Events emitted by the session orchestrator.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// An engine passed the handshake. It may still be queued behind the current one.
    NewConnectionEstablished {
        connection: ConnectionId,
        peer: Option<SocketAddr>,
        init: InitMessage,
    },
    /// A connection became current.
    DebuggingStarted { connection: ConnectionId },
    /// Breakpoints pushed and feature limits applied on the current connection.
    PostStartComplete,
    Stepped(ContinuationMessage),
    GotVariables(Vec<ContextVariables>),
    GotStacktraces(Vec<StackFrame>),
    BreakpointSet(CommandOutcome<Option<u64>>),
    BreakpointRemoved(CommandOutcome<u64>),
    /// Current breakpoint set, from the engine while debugging, local otherwise.
    BreakpointsListed(Vec<Breakpoint>),
    ExpressionEvaluated { index: usize, result: Variable },
    ExpressionsEvaluated(Vec<Variable>),
    /// A command failed on the current connection.
    ConnectionError { action: String, message: String },
    ServerError(String),
    ServerStopped,
    /// The current connection ended and none was waiting.
    DebuggingStopped,
    StateChanged(SessionState),
}
