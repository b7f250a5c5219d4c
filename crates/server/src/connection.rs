//! One accepted engine connection.
//!
//! A [`Connection`] is a cheap handle. The socket itself is owned by a
//! worker task that pulls [`DebugCommand`]s off a queue and runs them one
//! at a time: DBGp is strictly request/response and a second command written
//! before the first reply is read would desynchronise the frame reader.
//! Results are reported as [`ConnectionEvent`]s on the owner's channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use xdbg_protocol::{
    Breakpoint, Command, CommandOutcome, ContextVariables, ContinuationMessage, InitMessage,
    MessageParser, Variable,
};

use crate::config::FeatureLimits;
use crate::error::ConnectionError;
use crate::events::{CommandResult, ConnectionEvent, ConnectionId, ServerEvent};
use crate::wire::{read_frame, write_command};

/// Commands waiting for the worker. Capacity only bounds how far callers
/// may run ahead; execution is always one at a time.
const COMMAND_QUEUE_CAPACITY: usize = 32;

/// Units of work a connection executes.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugCommand {
    /// Push `breakpoints`, apply feature limits, then list breakpoints.
    PostStart { breakpoints: Vec<Breakpoint> },
    Stop,
    Detach,
    StepRun,
    StepOver,
    StepInto,
    StepOut,
    /// Fetch contexts and their variables, the stack, and `watch` values.
    PostStep { watch: Vec<String> },
    SetBreakpoint(Breakpoint),
    RemoveBreakpoint(u64),
    ListBreakpoints,
    EvaluateExpression { index: usize, expression: String },
    EvaluateExpressions(Vec<String>),
    SetDebuggerFeatures,
    LoadTypemap,
}

impl DebugCommand {
    /// Name reported with a failure of this command.
    pub fn action(&self) -> &'static str {
        match self {
            DebugCommand::PostStart { .. } => "post_start",
            DebugCommand::Stop => "stop",
            DebugCommand::Detach => "detach",
            DebugCommand::StepRun => "step_run",
            DebugCommand::StepOver => "step_over",
            DebugCommand::StepInto => "step_into",
            DebugCommand::StepOut => "step_out",
            DebugCommand::PostStep { .. } => "post_step",
            DebugCommand::SetBreakpoint(_) => "set_breakpoint",
            DebugCommand::RemoveBreakpoint(_) => "remove_breakpoint",
            DebugCommand::ListBreakpoints => "list_breakpoints",
            DebugCommand::EvaluateExpression { .. } => "evaluate_expression",
            DebugCommand::EvaluateExpressions(_) => "evaluate_expressions",
            DebugCommand::SetDebuggerFeatures => "set_debugger_features",
            DebugCommand::LoadTypemap => "load_typemap",
        }
    }

    /// The engine closes the session after these.
    fn ends_session(&self) -> bool {
        matches!(self, DebugCommand::Stop | DebugCommand::Detach)
    }
}

/// Handle to a live engine connection.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    init: Arc<InitMessage>,
    commands: mpsc::Sender<DebugCommand>,
    cancel: CancellationToken,
}

impl Connection {
    /// Spawns the worker owning `reader`/`writer` and returns its handle.
    ///
    /// The handshake must already have been consumed from `reader`.
    pub fn spawn<R, W>(
        id: ConnectionId,
        peer: Option<SocketAddr>,
        init: InitMessage,
        reader: R,
        writer: W,
        limits: FeatureLimits,
        events_tx: mpsc::Sender<ServerEvent>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let cancel = CancellationToken::new();

        let worker = Worker {
            id,
            reader,
            writer,
            next_transaction_id: 1,
            parser: MessageParser::new().with_depth_ceiling(limits.max_depth as usize),
            limits,
            events_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(worker.run(commands_rx));

        Self {
            id,
            peer,
            init: Arc::new(init),
            commands: commands_tx,
            cancel,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Handshake sent by the engine.
    pub fn init(&self) -> &InitMessage {
        &self.init
    }

    /// Returns `false` once the worker has exited or [`close`](Self::close) was called.
    pub fn is_alive(&self) -> bool {
        !self.cancel.is_cancelled() && !self.commands.is_closed()
    }

    /// Forcibly closes the socket. An in-flight command is abandoned.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Queues a command for the worker.
    pub async fn execute(&self, command: DebugCommand) -> Result<(), ConnectionError> {
        if self.cancel.is_cancelled() {
            return Err(ConnectionError::Closed);
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    pub async fn post_start(&self, breakpoints: Vec<Breakpoint>) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::PostStart { breakpoints }).await
    }

    pub async fn stop(&self) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::Stop).await
    }

    pub async fn detach(&self) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::Detach).await
    }

    pub async fn step_run(&self) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::StepRun).await
    }

    pub async fn step_over(&self) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::StepOver).await
    }

    pub async fn step_into(&self) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::StepInto).await
    }

    pub async fn step_out(&self) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::StepOut).await
    }

    pub async fn post_step(&self, watch: Vec<String>) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::PostStep { watch }).await
    }

    pub async fn set_breakpoint(&self, breakpoint: Breakpoint) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::SetBreakpoint(breakpoint)).await
    }

    pub async fn remove_breakpoint(&self, id: u64) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::RemoveBreakpoint(id)).await
    }

    pub async fn list_breakpoints(&self) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::ListBreakpoints).await
    }

    pub async fn evaluate_expression(
        &self,
        index: usize,
        expression: impl Into<String>,
    ) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::EvaluateExpression {
            index,
            expression: expression.into(),
        })
        .await
    }

    pub async fn evaluate_expressions(
        &self,
        expressions: Vec<String>,
    ) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::EvaluateExpressions(expressions))
            .await
    }

    pub async fn set_debugger_features(&self) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::SetDebuggerFeatures).await
    }

    pub async fn load_typemap(&self) -> Result<(), ConnectionError> {
        self.execute(DebugCommand::LoadTypemap).await
    }
}

/// Owns the socket halves and runs commands in arrival order.
struct Worker<R, W> {
    id: ConnectionId,
    reader: R,
    writer: W,
    next_transaction_id: u32,
    parser: MessageParser,
    limits: FeatureLimits,
    events_tx: mpsc::Sender<ServerEvent>,
    cancel: CancellationToken,
}

impl<R, W> Worker<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn run(mut self, mut commands: mpsc::Receiver<DebugCommand>) {
        let id = self.id;
        debug!(connection = %id, "connection worker started");

        loop {
            let command = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(c) => c,
                    None => break,
                },
            };

            let action = command.action();
            let ends_session = command.ends_session();
            let cancel = self.cancel.clone();

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ConnectionError::Cancelled),
                result = self.execute(command) => result,
            };

            match result {
                Ok(result) => {
                    emit(
                        &self.events_tx,
                        ConnectionEvent::Completed {
                            connection: id,
                            result,
                        },
                    )
                    .await;
                    if ends_session {
                        break;
                    }
                }
                Err(ConnectionError::Cancelled) => {
                    info!(connection = %id, action, "connection closed while busy");
                    break;
                }
                Err(e) => {
                    if e.is_fatal() {
                        error!(connection = %id, action, error = %e, "command failed");
                    } else {
                        warn!(connection = %id, action, error = %e, "command failed");
                    }
                    let fatal = e.is_fatal();
                    emit(
                        &self.events_tx,
                        ConnectionEvent::Failed {
                            connection: id,
                            action,
                            message: e.to_string(),
                        },
                    )
                    .await;
                    if fatal {
                        break;
                    }
                }
            }
        }

        self.cancel.cancel();
        let _ = self.writer.shutdown().await;
        info!(connection = %id, "connection closed");
        emit(&self.events_tx, ConnectionEvent::Disconnected { connection: id }).await;
    }

    async fn execute(&mut self, command: DebugCommand) -> Result<CommandResult, ConnectionError> {
        match command {
            DebugCommand::PostStart { breakpoints } => self.post_start(&breakpoints).await,
            DebugCommand::Stop => Ok(CommandResult::Stopped(
                self.continuation(Command::stop()).await?,
            )),
            DebugCommand::Detach => Ok(CommandResult::Detached(
                self.continuation(Command::detach()).await?,
            )),
            DebugCommand::StepRun => self.step(Command::run()).await,
            DebugCommand::StepOver => self.step(Command::step_over()).await,
            DebugCommand::StepInto => self.step(Command::step_into()).await,
            DebugCommand::StepOut => self.step(Command::step_out()).await,
            DebugCommand::PostStep { watch } => self.post_step(&watch).await,
            DebugCommand::SetBreakpoint(breakpoint) => Ok(CommandResult::BreakpointSet(
                self.set_breakpoint(&breakpoint).await?,
            )),
            DebugCommand::RemoveBreakpoint(id) => {
                let reply = self.transact(Command::breakpoint_remove(id)).await?;
                Ok(CommandResult::BreakpointRemoved(
                    self.parser.parse_breakpoint_remove(&reply)?,
                ))
            }
            DebugCommand::ListBreakpoints => Ok(CommandResult::BreakpointsListed(
                self.list_breakpoints().await?,
            )),
            DebugCommand::EvaluateExpression { index, expression } => {
                Ok(CommandResult::ExpressionEvaluated {
                    index,
                    result: self.evaluate(&expression).await?,
                })
            }
            DebugCommand::EvaluateExpressions(expressions) => Ok(
                CommandResult::ExpressionsEvaluated(self.evaluate_all(&expressions).await?),
            ),
            DebugCommand::SetDebuggerFeatures => {
                Ok(CommandResult::FeaturesSet(self.set_features().await?))
            }
            DebugCommand::LoadTypemap => {
                let reply = self.transact(Command::typemap_get()).await?;
                let typemap = self.parser.parse_typemap(&reply)?;
                let count = typemap.len();
                self.parser.set_typemap(typemap);
                debug!(connection = %self.id, types = count, "typemap loaded");
                Ok(CommandResult::TypemapLoaded(count))
            }
        }
    }

    /// Sends one command and waits for its reply frame.
    async fn transact(&mut self, command: Command) -> Result<String, ConnectionError> {
        let transaction_id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1).max(1);

        let line = command.to_line(transaction_id);
        debug!(connection = %self.id, transaction_id, command = command.name(), "sending");
        write_command(&mut self.writer, &line).await?;

        let reply = read_frame(&mut self.reader).await?;
        trace!(connection = %self.id, transaction_id, body = %reply, "reply");
        Ok(reply)
    }

    async fn continuation(&mut self, command: Command) -> Result<ContinuationMessage, ConnectionError> {
        let reply = self.transact(command).await?;
        Ok(self.parser.parse_continuation(&reply)?)
    }

    async fn step(&mut self, command: Command) -> Result<CommandResult, ConnectionError> {
        Ok(CommandResult::Stepped(self.continuation(command).await?))
    }

    async fn set_breakpoint(
        &mut self,
        breakpoint: &Breakpoint,
    ) -> Result<CommandOutcome<Option<u64>>, ConnectionError> {
        let reply = self.transact(Command::breakpoint_set(breakpoint)).await?;
        Ok(self.parser.parse_breakpoint_set(&reply)?)
    }

    async fn list_breakpoints(&mut self) -> Result<Vec<Breakpoint>, ConnectionError> {
        let reply = self.transact(Command::breakpoint_list()).await?;
        Ok(self.parser.parse_breakpoint_list(&reply)?)
    }

    async fn evaluate(&mut self, expression: &str) -> Result<Variable, ConnectionError> {
        let reply = self.transact(Command::eval(expression)).await?;
        Ok(self.parser.parse_eval(&reply)?)
    }

    async fn evaluate_all(&mut self, expressions: &[String]) -> Result<Vec<Variable>, ConnectionError> {
        let mut results = Vec::with_capacity(expressions.len());
        for expression in expressions {
            results.push(self.evaluate(expression).await?);
        }
        Ok(results)
    }

    async fn set_features(
        &mut self,
    ) -> Result<Vec<(&'static str, CommandOutcome<()>)>, ConnectionError> {
        let mut outcomes = Vec::new();
        for (feature, value) in self.limits.features() {
            let reply = self.transact(Command::feature_set(feature, value)).await?;
            let outcome = self.parser.parse_feature_set(&reply)?;
            if let CommandOutcome::Failure(detail) = &outcome {
                warn!(connection = %self.id, feature, value, ?detail, "feature_set refused");
            }
            outcomes.push((feature, outcome));
        }
        Ok(outcomes)
    }

    async fn post_start(&mut self, breakpoints: &[Breakpoint]) -> Result<CommandResult, ConnectionError> {
        for breakpoint in breakpoints {
            if let CommandOutcome::Failure(detail) = self.set_breakpoint(breakpoint).await? {
                warn!(
                    connection = %self.id,
                    filename = %breakpoint.filename,
                    lineno = breakpoint.lineno,
                    ?detail,
                    "breakpoint refused"
                );
            }
        }
        self.set_features().await?;
        let breakpoints = self.list_breakpoints().await?;
        Ok(CommandResult::PostStart { breakpoints })
    }

    async fn post_step(&mut self, watch: &[String]) -> Result<CommandResult, ConnectionError> {
        let reply = self.transact(Command::context_names()).await?;
        let contexts = self.parser.parse_contexts(&reply)?;

        let mut variables = Vec::with_capacity(contexts.len());
        for context in contexts {
            let reply = self.transact(Command::context_get(context.id)).await?;
            variables.push(ContextVariables {
                variables: self.parser.parse_variables(&reply)?,
                context,
            });
        }

        let reply = self.transact(Command::stack_get()).await?;
        let stacktraces = self.parser.parse_stack(&reply)?;

        let expressions = self.evaluate_all(watch).await?;

        Ok(CommandResult::PostStep {
            variables,
            stacktraces,
            expressions,
        })
    }
}

/// Must not borrow the worker: its socket halves are only required to be `Send`.
async fn emit(events_tx: &mpsc::Sender<ServerEvent>, event: ConnectionEvent) {
    let _ = events_tx.send(ServerEvent::Connection(event)).await;
}
