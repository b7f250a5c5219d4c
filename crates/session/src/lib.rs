//! Debug session orchestration.
//!
//! [`SessionOrchestrator`] sits between a presentation layer and the DBGp
//! transport: it queues engine connections in arrival order, debugs one at
//! a time, keeps the session's breakpoints and re-emits connection results
//! as [`SessionEvent`]s.

pub mod breakpoints;
pub mod error;
pub mod orchestrator;
mod pump;
mod state;
pub mod types;

pub use breakpoints::BreakpointBook;
pub use error::SessionError;
pub use orchestrator::SessionOrchestrator;
pub use types::{SessionEvent, SessionState};
