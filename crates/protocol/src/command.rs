//! DBGp command lines.
//!
//! ```text
//! <command> -i <transaction_id> [-<flag> <value>]... [-- <base64 data>]
//! ```
//!
//! The line is NUL-terminated on the wire; see the server crate's frame
//! codec. Free-form payloads (eval expressions) always travel base64-encoded
//! after `--`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::constants::commands;
use crate::types::{Breakpoint, LINE_BREAKPOINT};

/// A DBGp command waiting for its transaction id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: &'static str,
    args: Vec<(char, String)>,
    data: Option<String>,
}

impl Command {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            args: Vec::new(),
            data: None,
        }
    }

    /// Appends a `-<flag> <value>` argument.
    pub fn arg(mut self, flag: char, value: impl ToString) -> Self {
        self.args.push((flag, value.to_string()));
        self
    }

    /// Attaches a free-form payload, sent base64-encoded after `--`.
    pub fn data(mut self, payload: &str) -> Self {
        self.data = Some(STANDARD.encode(payload.as_bytes()));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Renders the command line for the given transaction id.
    pub fn to_line(&self, transaction_id: u32) -> String {
        let mut line = format!("{} -i {transaction_id}", self.name);
        for (flag, value) in &self.args {
            line.push_str(" -");
            line.push(*flag);
            line.push(' ');
            line.push_str(&quote_arg(value));
        }
        if let Some(data) = &self.data {
            line.push_str(" -- ");
            line.push_str(data);
        }
        line
    }

    pub fn step_into() -> Self {
        Self::new(commands::STEP_INTO)
    }

    pub fn step_over() -> Self {
        Self::new(commands::STEP_OVER)
    }

    pub fn step_out() -> Self {
        Self::new(commands::STEP_OUT)
    }

    pub fn run() -> Self {
        Self::new(commands::RUN)
    }

    pub fn stop() -> Self {
        Self::new(commands::STOP)
    }

    pub fn detach() -> Self {
        Self::new(commands::DETACH)
    }

    /// `breakpoint_set -t line -f <filename> -n <lineno>`.
    pub fn breakpoint_set(breakpoint: &Breakpoint) -> Self {
        Self::new(commands::BREAKPOINT_SET)
            .arg('t', LINE_BREAKPOINT)
            .arg('f', &breakpoint.filename)
            .arg('n', breakpoint.lineno)
    }

    pub fn breakpoint_remove(id: u64) -> Self {
        Self::new(commands::BREAKPOINT_REMOVE).arg('d', id)
    }

    pub fn breakpoint_list() -> Self {
        Self::new(commands::BREAKPOINT_LIST)
    }

    pub fn context_names() -> Self {
        Self::new(commands::CONTEXT_NAMES)
    }

    pub fn context_get(context_id: u32) -> Self {
        Self::new(commands::CONTEXT_GET).arg('c', context_id)
    }

    pub fn stack_get() -> Self {
        Self::new(commands::STACK_GET)
    }

    pub fn eval(expression: &str) -> Self {
        Self::new(commands::EVAL).data(expression)
    }

    pub fn feature_set(feature: &str, value: impl ToString) -> Self {
        Self::new(commands::FEATURE_SET)
            .arg('n', feature)
            .arg('v', value)
    }

    pub fn typemap_get() -> Self {
        Self::new(commands::TYPEMAP_GET)
    }
}

/// Quotes a value containing whitespace or quotes; plain values pass through.
fn quote_arg(value: &str) -> String {
    let needs_quotes =
        value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == '"');
    if !needs_quotes {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
