use xdbg_server::{ConnectionError, ServerError};

/// Errors returned by [`SessionOrchestrator`](crate::SessionOrchestrator) commands.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no engine is being debugged")]
    NotDebugging,

    #[error("already listening")]
    AlreadyListening,

    #[error("not listening")]
    NotListening,

    #[error("breakpoint at {filename}:{lineno} has no engine id")]
    UnknownBreakpoint { filename: String, lineno: u32 },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Server(#[from] ServerError),
}
