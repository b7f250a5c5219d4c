//! Breakpoints owned by one session.

use xdbg_protocol::Breakpoint;

/// The session's breakpoint set, keyed by `(filename, lineno)`.
///
/// While no engine is attached entries are pending and carry no id. Once
/// an engine lists its breakpoints the book mirrors that list, ids included.
#[derive(Debug, Default, Clone)]
pub struct BreakpointBook {
    entries: Vec<Breakpoint>,
}

impl BreakpointBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a breakpoint unless one already exists at that location.
    ///
    /// Returns `true` if it was added.
    pub fn add(&mut self, breakpoint: Breakpoint) -> bool {
        if self.entries.contains(&breakpoint) {
            return false;
        }
        self.entries.push(breakpoint);
        true
    }

    /// Removes the breakpoint at `filename:lineno`. Returns `true` if one existed.
    pub fn remove_at(&mut self, filename: &str, lineno: u32) -> bool {
        let before = self.entries.len();
        self.entries.retain(|bp| !bp.is_at(filename, lineno));
        self.entries.len() != before
    }

    /// Engine-assigned id of the breakpoint at `filename:lineno`.
    pub fn id_at(&self, filename: &str, lineno: u32) -> Option<u64> {
        self.entries
            .iter()
            .find(|bp| bp.is_at(filename, lineno))
            .and_then(|bp| bp.id)
    }

    /// Replaces the book with the engine's list.
    pub fn sync(&mut self, listed: Vec<Breakpoint>) {
        self.entries.clear();
        for breakpoint in listed {
            self.add(breakpoint);
        }
    }

    /// Forgets engine ids and states, keeping locations pending for the
    /// next connection.
    pub fn detach(&mut self) {
        for bp in &mut self.entries {
            bp.id = None;
            bp.state = None;
        }
    }

    pub fn all(&self) -> Vec<Breakpoint> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
