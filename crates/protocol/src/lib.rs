//! DBGp protocol vocabulary.
//!
//! Pure, I/O-free building blocks shared by the server and session crates:
//! the data model exchanged with a debugger engine, the command-line
//! builder, and [`MessageParser`] which decodes the engine's XML replies.

pub mod command;
pub mod constants;
pub mod error;
pub mod parser;
pub mod types;

// Re-export primary types for convenience.
pub use command::Command;
pub use error::ParseError;
pub use parser::{MessageParser, Typemap, normalize_file_uri};
pub use types::{
    Breakpoint, CommandOutcome, ContextVariables, ContinuationMessage, EngineError, InitMessage,
    StackFrame, Status, Variable, VariableContent, VariableContext,
};
