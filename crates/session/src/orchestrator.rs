//! Session orchestrator.
//!
//! Owns the listener, the FIFO of engines waiting their turn, the single
//! current connection and the breakpoint book. Commands from the
//! presentation layer are forwarded to the current connection; results
//! come back as [`SessionEvent`]s on the channel returned by
//! [`take_events`](SessionOrchestrator::take_events).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::info;

use xdbg_protocol::{Breakpoint, ContinuationMessage};
use xdbg_server::{Connection, DebugCommand, DebuggerConfig, Listener, ServerEvent};

use crate::error::SessionError;
use crate::pump::{self, SessionContext};
use crate::state::{Effects, EventSink, ListenerHandle, SessionInner};
use crate::types::{SessionEvent, SessionState};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Drives debug sessions for a presentation layer.
pub struct SessionOrchestrator {
    config: DebuggerConfig,
    session: Arc<Mutex<SessionInner>>,
    server_tx: mpsc::Sender<ServerEvent>,
    events: EventSink,
    events_rx: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
    cancel: CancellationToken,
}

impl SessionOrchestrator {
    /// Creates an idle orchestrator. Must be called inside a Tokio runtime.
    ///
    /// Events emitted before [`take_events`](Self::take_events) are buffered
    /// up to the channel capacity; the overflow is discarded.
    pub fn new(config: DebuggerConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let events = EventSink::new(events_tx);
        let (server_tx, server_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let session = Arc::new(Mutex::new(SessionInner::new()));
        let cancel = CancellationToken::new();

        let ctx = SessionContext {
            session: session.clone(),
            events: events.clone(),
        };
        tokio::spawn(pump::run(ctx, server_rx, cancel.clone()));

        Self {
            config,
            session,
            server_tx,
            events,
            events_rx: Mutex::new(Some(events_rx)),
            cancel,
        }
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// From then on the session waits for the reader when the channel is
    /// full, so the receiver must be drained.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<SessionEvent>> {
        let rx = self.events_rx.lock().await.take();
        if rx.is_some() {
            self.events.mark_taken();
        }
        rx
    }

    pub fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state
    }

    /// Address the listener is bound to, if listening.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.session
            .lock()
            .await
            .listener
            .as_ref()
            .map(|l| l.local_addr)
    }

    /// Binds the listener and starts accepting engines.
    pub async fn start_listening(&self) -> Result<SocketAddr, SessionError> {
        let mut fx = Effects::default();
        let result = {
            let mut session = self.session.lock().await;
            if session.listener.is_some() {
                return Err(SessionError::AlreadyListening);
            }

            let cancel = self.cancel.child_token();
            match Listener::bind(self.config.clone(), self.server_tx.clone(), cancel.clone()).await
            {
                Ok(listener) => {
                    let local_addr = listener.local_addr();
                    tokio::spawn(listener.run());
                    session.listener = Some(ListenerHandle { cancel, local_addr });
                    if session.current.is_none() {
                        session.set_state(SessionState::WaitingForConnection, &mut fx);
                    }
                    Ok(local_addr)
                }
                Err(e) => {
                    fx.emit(SessionEvent::ServerError(e.to_string()));
                    Err(SessionError::from(e))
                }
            }
        };
        fx.apply(&self.events).await;
        result
    }

    /// Drops queued engines, stops the current one, then stops the listener.
    pub async fn stop_listening(&self) -> Result<(), SessionError> {
        let mut fx = Effects::default();
        {
            let mut session = self.session.lock().await;
            let Some(listener) = session.listener.take() else {
                return Err(SessionError::NotListening);
            };

            for queued in session.pending.drain(..) {
                queued.close();
            }
            if let Some(current) = session.current.clone() {
                session.set_state(SessionState::Stopping, &mut fx);
                fx.queue(&current, DebugCommand::Stop);
            } else {
                session.set_state(SessionState::Idle, &mut fx);
            }
            listener.cancel.cancel();
            info!(local_addr = %listener.local_addr, "stopped listening");
        }
        fx.apply(&self.events).await;
        Ok(())
    }

    pub async fn stop_debug(&self) -> Result<(), SessionError> {
        self.end_session(DebugCommand::Stop).await
    }

    pub async fn detach_debug(&self) -> Result<(), SessionError> {
        self.end_session(DebugCommand::Detach).await
    }

    async fn end_session(&self, command: DebugCommand) -> Result<(), SessionError> {
        let mut fx = Effects::default();
        let current = {
            let mut session = self.session.lock().await;
            let current = session.current.clone().ok_or(SessionError::NotDebugging)?;
            session.set_state(SessionState::Stopping, &mut fx);
            current
        };
        fx.apply(&self.events).await;
        Ok(current.execute(command).await?)
    }

    /// Forcibly closes the current connection's socket.
    ///
    /// Use when the engine stopped answering; the session then continues
    /// with the next queued engine.
    pub async fn abort_current(&self) -> Result<(), SessionError> {
        let current = self.current().await?;
        current.close();
        Ok(())
    }

    pub async fn step_run(&self) -> Result<(), SessionError> {
        Ok(self.current().await?.step_run().await?)
    }

    pub async fn step_over(&self) -> Result<(), SessionError> {
        Ok(self.current().await?.step_over().await?)
    }

    pub async fn step_into(&self) -> Result<(), SessionError> {
        Ok(self.current().await?.step_into().await?)
    }

    pub async fn step_out(&self) -> Result<(), SessionError> {
        Ok(self.current().await?.step_out().await?)
    }

    /// Sets a breakpoint on the engine, or records it as pending.
    pub async fn set_breakpoint(&self, breakpoint: Breakpoint) -> Result<(), SessionError> {
        let mut fx = Effects::default();
        {
            let mut session = self.session.lock().await;
            match session.current.clone() {
                Some(current) => fx.queue(&current, DebugCommand::SetBreakpoint(breakpoint)),
                None => {
                    session.breakpoints.add(breakpoint);
                    fx.emit(SessionEvent::BreakpointsListed(session.breakpoints.all()));
                }
            }
        }
        fx.apply(&self.events).await;
        Ok(())
    }

    /// Removes a breakpoint from the engine, or from the pending set.
    ///
    /// While debugging, the engine id is taken from `breakpoint.id` or
    /// looked up by location.
    pub async fn remove_breakpoint(&self, breakpoint: &Breakpoint) -> Result<(), SessionError> {
        let mut fx = Effects::default();
        {
            let mut session = self.session.lock().await;
            match session.current.clone() {
                Some(current) => {
                    let id = breakpoint
                        .id
                        .or_else(|| {
                            session
                                .breakpoints
                                .id_at(&breakpoint.filename, breakpoint.lineno)
                        })
                        .ok_or_else(|| SessionError::UnknownBreakpoint {
                            filename: breakpoint.filename.clone(),
                            lineno: breakpoint.lineno,
                        })?;
                    fx.queue(&current, DebugCommand::RemoveBreakpoint(id));
                }
                None => {
                    session
                        .breakpoints
                        .remove_at(&breakpoint.filename, breakpoint.lineno);
                    fx.emit(SessionEvent::BreakpointsListed(session.breakpoints.all()));
                }
            }
        }
        fx.apply(&self.events).await;
        Ok(())
    }

    /// Re-emits the breakpoint list, fetched from the engine while debugging.
    pub async fn list_breakpoints(&self) -> Result<(), SessionError> {
        let mut fx = Effects::default();
        {
            let session = self.session.lock().await;
            match session.current.clone() {
                Some(current) => fx.queue(&current, DebugCommand::ListBreakpoints),
                None => fx.emit(SessionEvent::BreakpointsListed(session.breakpoints.all())),
            }
        }
        fx.apply(&self.events).await;
        Ok(())
    }

    /// Snapshot of the breakpoint book.
    pub async fn breakpoints(&self) -> Vec<Breakpoint> {
        self.session.lock().await.breakpoints.all()
    }

    pub async fn evaluate_expression(
        &self,
        index: usize,
        expression: impl Into<String>,
    ) -> Result<(), SessionError> {
        Ok(self
            .current()
            .await?
            .evaluate_expression(index, expression)
            .await?)
    }

    /// Replaces the watch list and evaluates it now if an engine is attached.
    ///
    /// The list is re-evaluated after every break.
    pub async fn evaluate_expressions(&self, expressions: Vec<String>) -> Result<(), SessionError> {
        let current = {
            let mut session = self.session.lock().await;
            session.watch = expressions.clone();
            session.current.clone()
        };
        if let Some(current) = current {
            current.evaluate_expressions(expressions).await?;
        }
        Ok(())
    }

    pub async fn is_breaking(&self) -> bool {
        self.session.lock().await.is_breaking()
    }

    pub async fn is_stopping(&self) -> bool {
        self.session.lock().await.is_stopping()
    }

    pub async fn is_stopped(&self) -> bool {
        self.session.lock().await.is_stopped()
    }

    /// Last step, run, stop or detach result of the current session.
    pub async fn last_result(&self) -> Option<ContinuationMessage> {
        self.session.lock().await.last_result.clone()
    }

    /// File of the last break, as reported by the engine.
    pub async fn current_file(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .location
            .as_ref()
            .map(|(file, _)| file.clone())
    }

    pub async fn current_line(&self) -> Option<u32> {
        self.session.lock().await.location.as_ref().map(|(_, line)| *line)
    }

    /// Number of engines waiting behind the current one.
    pub async fn pending_connections(&self) -> usize {
        self.session.lock().await.pending.len()
    }

    async fn current(&self) -> Result<Connection, SessionError> {
        self.session
            .lock()
            .await
            .current
            .clone()
            .ok_or(SessionError::NotDebugging)
    }

    /// Closes every connection and the listener.
    pub async fn shutdown(&self) {
        let mut session = self.session.lock().await;
        for queued in session.pending.drain(..) {
            queued.close();
        }
        if let Some(current) = session.current.take() {
            current.close();
        }
        self.cancel.cancel();
        info!("session orchestrator shut down");
    }
}

impl Drop for SessionOrchestrator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
