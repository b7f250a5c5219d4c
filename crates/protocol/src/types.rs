use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Engine execution status reported by continuation commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Starting,
    Running,
    Break,
    Stopping,
    Stopped,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Starting => "starting",
            Status::Running => "running",
            Status::Break => "break",
            Status::Stopping => "stopping",
            Status::Stopped => "stopped",
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starting" => Ok(Status::Starting),
            "running" => Ok(Status::Running),
            "break" => Ok(Status::Break),
            "stopping" => Ok(Status::Stopping),
            "stopped" => Ok(Status::Stopped),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a step/run/stop/detach command.
///
/// `filename` and `lineno` are only present when the engine stopped at a
/// break.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinuationMessage {
    pub command: String,
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
}

impl ContinuationMessage {
    /// Returns `true` if the reported status equals `status`.
    pub fn is_status(&self, status: Status) -> bool {
        self.status == Some(status)
    }
}

/// Handshake message sent once by the engine when it connects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitMessage {
    #[serde(default)]
    pub fileuri: String,
    #[serde(default)]
    pub idekey: String,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub copyright: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub protocol_version: String,
    #[serde(default)]
    pub appid: String,
}

/// Breakpoint type used for every breakpoint this client registers.
pub const LINE_BREAKPOINT: &str = "line";

/// A breakpoint, either pending (no id yet) or as listed by the engine.
///
/// Two breakpoints are equal when they point at the same `(filename, lineno)`;
/// the server-assigned id and state do not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breakpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub filename: String,
    pub lineno: u32,
    #[serde(rename = "type", default = "default_breakpoint_type")]
    pub breakpoint_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

fn default_breakpoint_type() -> String {
    LINE_BREAKPOINT.into()
}

impl Breakpoint {
    /// Creates a pending line breakpoint.
    pub fn line(filename: impl Into<String>, lineno: u32) -> Self {
        Self {
            id: None,
            filename: filename.into(),
            lineno,
            breakpoint_type: LINE_BREAKPOINT.into(),
            state: None,
        }
    }

    /// Returns `true` if both breakpoints point at the same location.
    pub fn is_at(&self, filename: &str, lineno: u32) -> bool {
        self.filename == filename && self.lineno == lineno
    }
}

impl PartialEq for Breakpoint {
    fn eq(&self, other: &Self) -> bool {
        self.is_at(&other.filename, other.lineno)
    }
}

impl Eq for Breakpoint {}

impl Hash for Breakpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.filename.hash(state);
        self.lineno.hash(state);
    }
}

/// A named variable scope (e.g. "Locals", "Superglobals").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableContext {
    pub id: u32,
    pub name: String,
}

/// Variables of one context, as fetched after a break.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextVariables {
    pub context: VariableContext,
    pub variables: Vec<Variable>,
}

/// Payload of a [`Variable`]: exactly one of a leaf value or children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableContent {
    Children { variables: Vec<Variable> },
    Value { value: Option<String> },
}

/// A node of the debuggee's variable tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numchildren: Option<u32>,
    #[serde(flatten)]
    pub content: VariableContent,
}

/// `type` of the pseudo-variable produced by a failed evaluation.
pub const ERROR_TYPE: &str = "error";

impl Variable {
    /// Builds the result of an evaluation the engine refused.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            var_type: ERROR_TYPE.into(),
            classname: None,
            encoding: None,
            size: None,
            numchildren: None,
            content: VariableContent::Value {
                value: Some(message.into()),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        self.var_type == ERROR_TYPE
    }

    /// Leaf value, `None` for containers and for empty leaves.
    pub fn value(&self) -> Option<&str> {
        match &self.content {
            VariableContent::Value { value } => value.as_deref(),
            VariableContent::Children { .. } => None,
        }
    }

    /// Children, `None` for leaves.
    pub fn children(&self) -> Option<&[Variable]> {
        match &self.content {
            VariableContent::Children { variables } => Some(variables),
            VariableContent::Value { .. } => None,
        }
    }
}

/// One frame of the call stack, innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub filename: String,
    pub lineno: u32,
    #[serde(rename = "where")]
    pub location: String,
    pub level: u32,
}

/// Error detail carried by a negative engine reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineError {
    pub code: u32,
    pub message: String,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine error {}: {}", self.code, self.message)
    }
}

/// Typed result of a command the engine may refuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandOutcome<T> {
    Success(T),
    /// The engine refused. Error detail is present when the reply had one.
    Failure(Option<EngineError>),
}

impl<T> CommandOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            CommandOutcome::Success(v) => Some(v),
            CommandOutcome::Failure(_) => None,
        }
    }
}
