//! Session - scrollback, command history, and working directory for one leaf pane.
//!
//! A session is created together with its leaf (new tab or split) and
//! destroyed when the leaf closes. Scrollback entries are append-only
//! records of one exchange each; streamed sandbox output grows the latest
//! entry in place so partial output renders as it arrives.

use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a session (shared with its owning pane)
pub type SessionId = u64;

/// One immutable exchange in the scrollback
#[derive(Debug, Clone)]
pub struct TerminalEntry {
    pub id: u64,
    /// The submitted command line, if this entry started from input
    pub command: Option<String>,
    /// Accumulated output text
    pub output: Option<String>,
    pub is_error: bool,
    /// Unix timestamp (seconds)
    pub timestamp: u64,
}

/// History recall cursor state: -1 means "not browsing"
const NOT_BROWSING: isize = -1;

/// One logical shell instance bound 1:1 to a leaf pane
pub struct Session {
    pub id: SessionId,
    /// Scrollback, oldest first
    pub entries: Vec<TerminalEntry>,
    /// Command history, newest first
    pub command_history: Vec<String>,
    /// Current working directory (absolute)
    pub cwd: String,
    /// Line being edited
    pub input: String,
    /// True while a forwarded command is pending
    pub busy: bool,
    history_cursor: isize,
    /// Input saved when history browsing began
    saved_input: String,
    next_entry_id: u64,
    scrollback_limit: usize,
}

impl Session {
    pub fn new(id: SessionId, scrollback_limit: usize) -> Self {
        Self {
            id,
            entries: Vec::new(),
            command_history: Vec::new(),
            cwd: "/".to_string(),
            input: String::new(),
            busy: false,
            history_cursor: NOT_BROWSING,
            saved_input: String::new(),
            next_entry_id: 1,
            scrollback_limit,
        }
    }

    /// Create a session for a split, inheriting the working directory
    pub fn with_cwd(id: SessionId, scrollback_limit: usize, cwd: &str) -> Self {
        let mut session = Self::new(id, scrollback_limit);
        session.cwd = cwd.to_string();
        session
    }

    /// Append an entry recording a submitted command
    pub fn push_command(&mut self, command: &str, output: Option<String>, is_error: bool) {
        let entry = TerminalEntry {
            id: self.next_entry_id,
            command: Some(command.to_string()),
            output,
            is_error,
            timestamp: now(),
        };
        self.next_entry_id += 1;
        self.entries.push(entry);
        self.trim_scrollback();
    }

    /// Append an output-only entry (banners, error notices)
    pub fn push_output(&mut self, output: &str, is_error: bool) {
        let entry = TerminalEntry {
            id: self.next_entry_id,
            command: None,
            output: Some(output.to_string()),
            is_error,
            timestamp: now(),
        };
        self.next_entry_id += 1;
        self.entries.push(entry);
        self.trim_scrollback();
    }

    /// Append a streamed chunk to the latest entry's output.
    ///
    /// Used for incremental sandbox output; chunks never become new entries.
    pub fn append_output(&mut self, chunk: &str, is_error: bool) {
        if let Some(entry) = self.entries.last_mut() {
            entry.output.get_or_insert_with(String::new).push_str(chunk);
            if is_error {
                entry.is_error = true;
            }
        }
    }

    /// Record a command in history, deduplicating only against the most
    /// recent entry
    pub fn record_history(&mut self, command: &str) {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return;
        }
        if self.command_history.first().map(String::as_str) == Some(trimmed) {
            return;
        }
        self.command_history.insert(0, trimmed.to_string());
    }

    /// Walk one step back in history (up arrow)
    pub fn history_prev(&mut self) {
        if self.command_history.is_empty() {
            return;
        }
        if self.history_cursor == NOT_BROWSING {
            self.saved_input = self.input.clone();
        }
        let max = self.command_history.len() as isize - 1;
        self.history_cursor = (self.history_cursor + 1).min(max);
        self.input = self.command_history[self.history_cursor as usize].clone();
    }

    /// Walk one step forward in history (down arrow); -1 restores the
    /// edited buffer
    pub fn history_next(&mut self) {
        if self.history_cursor == NOT_BROWSING {
            return;
        }
        self.history_cursor -= 1;
        if self.history_cursor == NOT_BROWSING {
            self.input = self.saved_input.clone();
        } else {
            self.input = self.command_history[self.history_cursor as usize].clone();
        }
    }

    /// Reset the history cursor (after a submit or edit)
    pub fn reset_history_cursor(&mut self) {
        self.history_cursor = NOT_BROWSING;
        self.saved_input.clear();
    }

    /// Clear the scrollback (the `clear` builtin)
    pub fn clear_entries(&mut self) {
        self.entries.clear();
    }

    /// Count case-insensitive substring occurrences of `query` across the
    /// rendered text of all entries
    pub fn search_matches(&self, query: &str) -> usize {
        if query.is_empty() {
            return 0;
        }
        let needle = query.to_lowercase();
        let mut count = 0;
        for entry in &self.entries {
            if let Some(cmd) = &entry.command {
                count += cmd.to_lowercase().matches(&needle).count();
            }
            if let Some(out) = &entry.output {
                count += out.to_lowercase().matches(&needle).count();
            }
        }
        count
    }

    fn trim_scrollback(&mut self) {
        while self.entries.len() > self.scrollback_limit {
            self.entries.remove(0);
        }
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
