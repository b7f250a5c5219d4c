//! Routes listener and connection events into the session.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use xdbg_server::{ConnectionEvent, ServerEvent};

use crate::state::{Effects, EventSink, SessionInner};
use crate::types::SessionEvent;

/// Shared state handed to the pump task.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub(crate) session: Arc<Mutex<SessionInner>>,
    pub(crate) events: EventSink,
}

/// Consumes server events until `cancel` fires or every sender is gone.
pub(crate) async fn run(
    ctx: SessionContext,
    mut server_rx: mpsc::Receiver<ServerEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = server_rx.recv() => match event {
                Some(e) => e,
                None => break,
            },
        };
        handle(&ctx, event).await;
    }
    debug!("session pump stopped");
}

async fn handle(ctx: &SessionContext, event: ServerEvent) {
    let mut fx = Effects::default();
    {
        let mut session = ctx.session.lock().await;
        match event {
            ServerEvent::NewConnection(connection) => {
                session.on_new_connection(connection, &mut fx);
            }
            ServerEvent::ListenerError(message) => {
                warn!(%message, "listener error");
                fx.emit(SessionEvent::ServerError(message));
            }
            ServerEvent::ListenerStopped => {
                fx.emit(SessionEvent::ServerStopped);
            }
            ServerEvent::Connection(ConnectionEvent::Completed { connection, result }) => {
                session.on_completed(connection, result, &mut fx);
            }
            ServerEvent::Connection(ConnectionEvent::Failed {
                connection,
                action,
                message,
            }) => {
                session.on_failed(connection, action, message, &mut fx);
            }
            ServerEvent::Connection(ConnectionEvent::Disconnected { connection }) => {
                session.on_disconnected(connection, &mut fx);
            }
        }
    }
    fx.apply(&ctx.events).await;
}
