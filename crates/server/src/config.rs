use serde::{Deserialize, Serialize};

use xdbg_protocol::constants::{
    DEFAULT_HOST, DEFAULT_MAX_CHILDREN, DEFAULT_MAX_DATA, DEFAULT_MAX_DEPTH, DEFAULT_PORT,
};

/// Settings consumed by the listener and its connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebuggerConfig {
    /// Interface to bind. Empty means all interfaces.
    pub host: String,
    pub port: u16,
    /// Only engines presenting this key are accepted. Empty accepts any key.
    pub idekey: String,
    pub max_depth: u32,
    pub max_children: u32,
    pub max_data: u32,
    /// Step into the first line instead of running to the first breakpoint.
    pub break_at_first_line: bool,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            idekey: String::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_children: DEFAULT_MAX_CHILDREN,
            max_data: DEFAULT_MAX_DATA,
            break_at_first_line: true,
        }
    }
}

impl DebuggerConfig {
    /// `host:port` to bind, with an empty host meaning `0.0.0.0`.
    pub fn bind_addr(&self) -> String {
        match self.host.trim() {
            "" => format!("0.0.0.0:{}", self.port),
            host if host.contains(':') && !host.starts_with('[') => {
                format!("[{host}]:{}", self.port)
            }
            host => format!("{host}:{}", self.port),
        }
    }

    /// Whether an engine presenting `idekey` may connect.
    pub fn accepts_idekey(&self, idekey: &str) -> bool {
        self.idekey.is_empty() || self.idekey == idekey
    }

    pub fn feature_limits(&self) -> FeatureLimits {
        FeatureLimits {
            max_depth: self.max_depth,
            max_children: self.max_children,
            max_data: self.max_data,
        }
    }
}

/// Engine-side inspection limits applied with `feature_set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureLimits {
    pub max_depth: u32,
    pub max_children: u32,
    pub max_data: u32,
}

impl Default for FeatureLimits {
    fn default() -> Self {
        DebuggerConfig::default().feature_limits()
    }
}

impl FeatureLimits {
    /// `(feature name, value)` pairs in the order they are sent.
    pub fn features(&self) -> [(&'static str, u32); 3] {
        [
            ("max_depth", self.max_depth),
            ("max_children", self.max_children),
            ("max_data", self.max_data),
        ]
    }
}
