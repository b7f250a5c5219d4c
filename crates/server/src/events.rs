//! Events flowing from the listener and connection workers to their owner.

use std::fmt;

use xdbg_protocol::{
    Breakpoint, CommandOutcome, ContextVariables, ContinuationMessage, StackFrame, Variable,
};

use crate::connection::Connection;

/// Identifies one accepted engine connection for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the listener and its connections report.
#[derive(Debug)]
pub enum ServerEvent {
    /// An engine completed the handshake with an accepted idekey.
    NewConnection(Connection),
    /// Accepting failed; the listener keeps running.
    ListenerError(String),
    /// The accept loop exited.
    ListenerStopped,
    Connection(ConnectionEvent),
}

/// Outcome of one command executed by a connection worker.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Completed {
        connection: ConnectionId,
        result: CommandResult,
    },
    /// A command failed. `action` names the command that was in flight.
    Failed {
        connection: ConnectionId,
        action: &'static str,
        message: String,
    },
    /// The worker exited; the connection is dead and must not be reused.
    Disconnected { connection: ConnectionId },
}

impl ConnectionEvent {
    pub fn connection(&self) -> ConnectionId {
        match self {
            ConnectionEvent::Completed { connection, .. }
            | ConnectionEvent::Failed { connection, .. }
            | ConnectionEvent::Disconnected { connection } => *connection,
        }
    }
}

/// Typed result of a [`DebugCommand`](crate::connection::DebugCommand).
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Breakpoints pushed, features applied, and the engine's breakpoint list.
    PostStart { breakpoints: Vec<Breakpoint> },
    Stepped(ContinuationMessage),
    Stopped(ContinuationMessage),
    Detached(ContinuationMessage),
    /// Everything fetched after a break.
    PostStep {
        variables: Vec<ContextVariables>,
        stacktraces: Vec<StackFrame>,
        expressions: Vec<Variable>,
    },
    BreakpointSet(CommandOutcome<Option<u64>>),
    BreakpointRemoved(CommandOutcome<u64>),
    BreakpointsListed(Vec<Breakpoint>),
    ExpressionEvaluated { index: usize, result: Variable },
    ExpressionsEvaluated(Vec<Variable>),
    /// Per-feature outcome of `feature_set`.
    FeaturesSet(Vec<(&'static str, CommandOutcome<()>)>),
    /// Number of engine types in the loaded typemap.
    TypemapLoaded(usize),
}
