//! Session bookkeeping shared by the orchestrator and its event pump.
//!
//! Every transition runs under the session lock and only records what has
//! to happen next in [`Effects`]. Events are emitted and commands queued
//! after the lock is released.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use xdbg_protocol::{ContinuationMessage, Status};
use xdbg_server::{CommandResult, Connection, ConnectionId, DebugCommand};

use crate::breakpoints::BreakpointBook;
use crate::types::{SessionEvent, SessionState};

/// Handle on the running accept loop.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) local_addr: SocketAddr,
}

/// Sending side of the session event channel.
///
/// Until the receiver has been handed out, events that do not fit in the
/// channel are dropped so nothing upstream blocks on a reader that may
/// never exist.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: mpsc::Sender<SessionEvent>,
    taken: Arc<AtomicBool>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            tx,
            taken: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn mark_taken(&self) {
        self.taken.store(true, Ordering::Release);
    }

    pub(crate) async fn send(&self, event: SessionEvent) {
        if self.taken.load(Ordering::Acquire) {
            let _ = self.tx.send(event).await;
        } else if let Err(mpsc::error::TrySendError::Full(event)) = self.tx.try_send(event) {
            debug!(?event, "no event reader yet, dropping");
        }
    }
}

/// Follow-up work produced by a transition.
#[derive(Debug, Default)]
pub(crate) struct Effects {
    pub(crate) events: Vec<SessionEvent>,
    pub(crate) commands: Vec<(Connection, DebugCommand)>,
}

impl Effects {
    pub(crate) fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    pub(crate) fn queue(&mut self, connection: &Connection, command: DebugCommand) {
        self.commands.push((connection.clone(), command));
    }

    /// Emits the events, then hands the commands to their connections.
    pub(crate) async fn apply(self, events: &EventSink) {
        for event in self.events {
            events.send(event).await;
        }
        for (connection, command) in self.commands {
            let action = command.action();
            if let Err(e) = connection.execute(command).await {
                warn!(connection = %connection.id(), action, error = %e, "command not queued");
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct SessionInner {
    pub(crate) state: SessionState,
    pub(crate) listener: Option<ListenerHandle>,
    pub(crate) pending: VecDeque<Connection>,
    pub(crate) current: Option<Connection>,
    pub(crate) breakpoints: BreakpointBook,
    pub(crate) last_result: Option<ContinuationMessage>,
    pub(crate) location: Option<(String, u32)>,
    pub(crate) watch: Vec<String>,
}

impl SessionInner {
    pub(crate) fn new() -> Self {
        Self {
            state: SessionState::Idle,
            listener: None,
            pending: VecDeque::new(),
            current: None,
            breakpoints: BreakpointBook::new(),
            last_result: None,
            location: None,
            watch: Vec::new(),
        }
    }

    pub(crate) fn set_state(&mut self, state: SessionState, fx: &mut Effects) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "session state changed");
            self.state = state;
            fx.emit(SessionEvent::StateChanged(state));
        }
    }

    /// State to fall back to when no connection is current.
    pub(crate) fn resting_state(&self) -> SessionState {
        if self.listener.is_some() {
            SessionState::WaitingForConnection
        } else {
            SessionState::Idle
        }
    }

    fn last_status_is(&self, status: Status) -> bool {
        self.last_result
            .as_ref()
            .is_some_and(|result| result.is_status(status))
    }

    pub(crate) fn is_breaking(&self) -> bool {
        self.last_status_is(Status::Break)
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.last_status_is(Status::Stopping)
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.last_status_is(Status::Stopped)
    }

    fn is_current(&self, id: ConnectionId) -> bool {
        self.current.as_ref().is_some_and(|c| c.id() == id)
    }

    /// Makes `connection` current and starts its post-start sequence.
    fn promote(&mut self, connection: Connection, fx: &mut Effects) {
        info!(connection = %connection.id(), "debugging connection");
        self.last_result = None;
        self.location = None;
        self.set_state(SessionState::Debugging, fx);
        fx.emit(SessionEvent::DebuggingStarted {
            connection: connection.id(),
        });
        fx.queue(&connection, DebugCommand::LoadTypemap);
        fx.queue(
            &connection,
            DebugCommand::PostStart {
                breakpoints: self.breakpoints.all(),
            },
        );
        self.current = Some(connection);
    }

    pub(crate) fn on_new_connection(&mut self, connection: Connection, fx: &mut Effects) {
        fx.emit(SessionEvent::NewConnectionEstablished {
            connection: connection.id(),
            peer: connection.peer(),
            init: connection.init().clone(),
        });

        if self.listener.is_none() {
            // Arrived after stop_listening.
            connection.close();
            return;
        }

        if self.current.is_none() {
            self.promote(connection, fx);
        } else {
            debug!(
                connection = %connection.id(),
                queued = self.pending.len() + 1,
                "connection queued"
            );
            self.pending.push_back(connection);
        }
    }

    pub(crate) fn on_disconnected(&mut self, id: ConnectionId, fx: &mut Effects) {
        if !self.is_current(id) {
            self.pending.retain(|c| c.id() != id);
            return;
        }

        info!(connection = %id, "debugging connection ended");
        self.current = None;
        self.breakpoints.detach();

        match self.pending.pop_front() {
            Some(next) => self.promote(next, fx),
            None => {
                let resting = self.resting_state();
                self.set_state(resting, fx);
                fx.emit(SessionEvent::DebuggingStopped);
            }
        }
    }

    pub(crate) fn on_failed(
        &mut self,
        id: ConnectionId,
        action: &str,
        message: String,
        fx: &mut Effects,
    ) {
        if self.is_current(id) {
            fx.emit(SessionEvent::ConnectionError {
                action: action.to_string(),
                message,
            });
        } else {
            debug!(connection = %id, action, %message, "failure on queued connection");
        }
    }

    pub(crate) fn on_completed(&mut self, id: ConnectionId, result: CommandResult, fx: &mut Effects) {
        let Some(current) = self.current.clone().filter(|c| c.id() == id) else {
            debug!(connection = %id, "result from a connection that is not current");
            return;
        };

        match result {
            CommandResult::PostStart { breakpoints } => {
                self.breakpoints.sync(breakpoints);
                fx.emit(SessionEvent::BreakpointsListed(self.breakpoints.all()));
                fx.emit(SessionEvent::PostStartComplete);
            }
            CommandResult::Stepped(message) => {
                let at_break = message.is_status(Status::Break);
                if at_break && let (Some(file), Some(line)) = (&message.filename, message.lineno) {
                    self.location = Some((file.clone(), line));
                }
                self.last_result = Some(message.clone());
                fx.emit(SessionEvent::Stepped(message));
                if at_break {
                    fx.queue(
                        &current,
                        DebugCommand::PostStep {
                            watch: self.watch.clone(),
                        },
                    );
                }
            }
            CommandResult::Stopped(message) | CommandResult::Detached(message) => {
                debug!(connection = %id, status = ?message.status, "session ended by client");
                self.last_result = Some(message);
            }
            CommandResult::PostStep {
                variables,
                stacktraces,
                expressions,
            } => {
                fx.emit(SessionEvent::GotVariables(variables));
                fx.emit(SessionEvent::GotStacktraces(stacktraces));
                fx.emit(SessionEvent::ExpressionsEvaluated(expressions));
            }
            CommandResult::BreakpointSet(outcome) => {
                let relist = outcome.is_success();
                fx.emit(SessionEvent::BreakpointSet(outcome));
                if relist {
                    fx.queue(&current, DebugCommand::ListBreakpoints);
                }
            }
            CommandResult::BreakpointRemoved(outcome) => {
                let relist = outcome.is_success();
                fx.emit(SessionEvent::BreakpointRemoved(outcome));
                if relist {
                    fx.queue(&current, DebugCommand::ListBreakpoints);
                }
            }
            CommandResult::BreakpointsListed(breakpoints) => {
                self.breakpoints.sync(breakpoints);
                fx.emit(SessionEvent::BreakpointsListed(self.breakpoints.all()));
            }
            CommandResult::ExpressionEvaluated { index, result } => {
                fx.emit(SessionEvent::ExpressionEvaluated { index, result });
            }
            CommandResult::ExpressionsEvaluated(results) => {
                fx.emit(SessionEvent::ExpressionsEvaluated(results));
            }
            CommandResult::FeaturesSet(outcomes) => {
                let refused = outcomes.iter().filter(|(_, o)| !o.is_success()).count();
                debug!(connection = %id, refused, "debugger features applied");
            }
            CommandResult::TypemapLoaded(types) => {
                debug!(connection = %id, types, "typemap loaded");
            }
        }
    }
}
