//! Plain-text rendering of session events.

use std::fmt::Write;

use xdbg_protocol::{
    Breakpoint, CommandOutcome, ContinuationMessage, EngineError, StackFrame, Variable,
};
use xdbg_session::SessionEvent;

/// Text printed for `event`, or `None` for events that print nothing.
pub fn event(event: &SessionEvent) -> Option<String> {
    let text = match event {
        SessionEvent::NewConnectionEstablished {
            connection,
            peer,
            init,
        } => {
            let from = peer.map(|p| format!(" from {p}")).unwrap_or_default();
            format!(
                "engine {connection} connected{from}: {} {} ({}), idekey {:?}",
                init.engine, init.language, init.fileuri, init.idekey
            )
        }
        SessionEvent::DebuggingStarted { connection } => format!("debugging {connection}"),
        SessionEvent::PostStartComplete => return None,
        SessionEvent::Stepped(result) => match (&result.filename, result.lineno) {
            (Some(file), Some(line)) => format!("{} at {file}:{line}", status_text(result)),
            _ => status_text(result),
        },
        SessionEvent::GotVariables(contexts) => {
            let mut out = String::new();
            for context in contexts {
                let _ = writeln!(out, "[{}]", context.context.name);
                variables(&mut out, &context.variables, 1);
            }
            out.trim_end().to_string()
        }
        SessionEvent::GotStacktraces(frames) => stack(frames),
        SessionEvent::BreakpointSet(outcome) => match outcome {
            CommandOutcome::Success(Some(id)) => format!("breakpoint {id} set"),
            CommandOutcome::Success(None) => "breakpoint set".into(),
            CommandOutcome::Failure(detail) => failure("breakpoint not set", detail.as_ref()),
        },
        SessionEvent::BreakpointRemoved(outcome) => match outcome {
            CommandOutcome::Success(id) => format!("breakpoint {id} removed"),
            CommandOutcome::Failure(detail) => failure("breakpoint not removed", detail.as_ref()),
        },
        SessionEvent::BreakpointsListed(list) => breakpoints(list),
        SessionEvent::ExpressionEvaluated { index, result } => {
            let mut out = format!("[{index}] ");
            variable_line(&mut out, result);
            out
        }
        SessionEvent::ExpressionsEvaluated(results) => {
            if results.is_empty() {
                return None;
            }
            let mut out = String::from("watch:\n");
            variables(&mut out, results, 1);
            out.trim_end().to_string()
        }
        SessionEvent::ConnectionError { action, message } => {
            format!("error during {action}: {message}")
        }
        SessionEvent::ServerError(message) => format!("server error: {message}"),
        SessionEvent::ServerStopped => "no longer listening".into(),
        SessionEvent::DebuggingStopped => "debugging stopped".into(),
        SessionEvent::StateChanged(_) => return None,
    };
    Some(text)
}

fn status_text(result: &ContinuationMessage) -> String {
    match result.status {
        Some(status) => status.to_string(),
        None => format!("{} ({})", result.command, result.reason),
    }
}

fn failure(what: &str, detail: Option<&EngineError>) -> String {
    match detail {
        Some(detail) => format!("{what}: {detail}"),
        None => what.to_string(),
    }
}

fn breakpoints(list: &[Breakpoint]) -> String {
    if list.is_empty() {
        return "no breakpoints".into();
    }
    let mut out = String::new();
    for bp in list {
        let id = bp.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into());
        let _ = writeln!(out, "  {id:>10}  {}:{}", bp.filename, bp.lineno);
    }
    out.trim_end().to_string()
}

fn stack(frames: &[StackFrame]) -> String {
    let mut out = String::new();
    for frame in frames {
        let _ = writeln!(
            out,
            "  #{} {} {}:{}",
            frame.level, frame.location, frame.filename, frame.lineno
        );
    }
    out.trim_end().to_string()
}

fn variables(out: &mut String, vars: &[Variable], depth: usize) {
    for var in vars {
        out.push_str(&"  ".repeat(depth));
        variable_line(out, var);
        out.push('\n');
        if let Some(children) = var.children() {
            variables(out, children, depth + 1);
        }
    }
}

fn variable_line(out: &mut String, var: &Variable) {
    if !var.name.is_empty() {
        let _ = write!(out, "{} = ", var.name);
    }
    match (var.children(), var.classname.as_deref()) {
        (Some(children), Some(class)) => {
            let _ = write!(out, "{class} {{{}}}", children.len());
        }
        (Some(_), None) => {
            let count = var.numchildren.unwrap_or(0);
            let _ = write!(out, "{}[{count}]", var.var_type);
        }
        (None, _) => match var.value() {
            Some(value) if var.var_type == "string" => {
                let _ = write!(out, "{value:?}");
            }
            Some(value) => {
                let _ = write!(out, "({}) {value}", var.var_type);
            }
            None => out.push_str(&var.var_type),
        },
    }
}
