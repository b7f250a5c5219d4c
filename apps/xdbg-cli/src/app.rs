//! Wires the session orchestrator to the terminal.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use xdbg_protocol::Status;
use xdbg_session::{SessionError, SessionEvent, SessionOrchestrator};

use crate::config::Config;
use crate::input::{HELP, Input};
use crate::render;

/// Runs the debugger until `quit`, end of input or Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let break_at_first_line = config.debugger.break_at_first_line;
    let orchestrator = SessionOrchestrator::new(config.debugger);
    let mut events = orchestrator
        .take_events()
        .await
        .ok_or_else(|| anyhow::anyhow!("session events already taken"))?;

    if !config.watch.is_empty() {
        orchestrator.evaluate_expressions(config.watch).await?;
    }

    let addr = orchestrator.start_listening().await?;
    println!("listening on {addr}, type `help` for commands");

    let mut lines = spawn_stdin_reader();
    let mut next_eval_index = 0usize;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("SIGINT received, shutting down");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if let Some(text) = render::event(&event) {
                    println!("{text}");
                }
                follow_up(&orchestrator, &event, break_at_first_line).await;
            }
            line = lines.recv() => {
                let Some(line) = line else {
                    tracing::info!("end of input");
                    break;
                };
                match Input::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(Input::Quit)) => break,
                    Ok(Some(input)) => {
                        if let Err(e) = dispatch(&orchestrator, input, &mut next_eval_index).await {
                            println!("{e}");
                        }
                    }
                    Err(message) => println!("{message}"),
                }
            }
        }
    }

    orchestrator.shutdown().await;
    Ok(())
}

/// Commands issued automatically in response to session events.
async fn follow_up(orchestrator: &SessionOrchestrator, event: &SessionEvent, break_at_first_line: bool) {
    let result = match event {
        SessionEvent::PostStartComplete if break_at_first_line => orchestrator.step_into().await,
        SessionEvent::PostStartComplete => orchestrator.step_run().await,
        SessionEvent::Stepped(result)
            if result.is_status(Status::Stopping) || result.is_status(Status::Stopped) =>
        {
            orchestrator.stop_debug().await
        }
        _ => Ok(()),
    };
    if let Err(e) = result {
        tracing::warn!(error = %e, "automatic follow-up failed");
    }
}

async fn dispatch(
    orchestrator: &SessionOrchestrator,
    input: Input,
    next_eval_index: &mut usize,
) -> Result<(), SessionError> {
    match input {
        Input::Run => orchestrator.step_run().await,
        Input::StepOver => orchestrator.step_over().await,
        Input::StepInto => orchestrator.step_into().await,
        Input::StepOut => orchestrator.step_out().await,
        Input::Stop => orchestrator.stop_debug().await,
        Input::Detach => orchestrator.detach_debug().await,
        Input::Abort => orchestrator.abort_current().await,
        Input::Break(bp) => orchestrator.set_breakpoint(bp).await,
        Input::Delete(bp) => orchestrator.remove_breakpoint(&bp).await,
        Input::ListBreakpoints => orchestrator.list_breakpoints().await,
        Input::Eval(expression) => {
            let index = *next_eval_index;
            *next_eval_index += 1;
            orchestrator.evaluate_expression(index, expression).await
        }
        Input::Watch(expressions) => orchestrator.evaluate_expressions(expressions).await,
        Input::Listen => orchestrator.start_listening().await.map(|addr| {
            println!("listening on {addr}");
        }),
        Input::Unlisten => orchestrator.stop_listening().await,
        Input::Status => {
            print_status(orchestrator).await;
            Ok(())
        }
        Input::Help => {
            println!("{HELP}");
            Ok(())
        }
        Input::Quit => Ok(()),
    }
}

async fn print_status(orchestrator: &SessionOrchestrator) {
    let state = orchestrator.state().await;
    let location = match (
        orchestrator.current_file().await,
        orchestrator.current_line().await,
    ) {
        (Some(file), Some(line)) => format!(" at {file}:{line}"),
        _ => String::new(),
    };
    println!(
        "{state:?}{location}, {} queued, {} breakpoints",
        orchestrator.pending_connections().await,
        orchestrator.breakpoints().await.len()
    );
}

/// Forwards stdin lines until end of input.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}
