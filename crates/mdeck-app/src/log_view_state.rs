//! Log console state - buffered lines, search and streaming flags.
//!
//! [`ConsoleState`] is mutated only by [`crate::handler::update`]. Readers
//! get immutable [`ConsoleSnapshot`]s published by the console engine.

use serde::Serialize;

use mdeck_core::{LogBuffer, LogEvent, RunningApp, SearchIndex};

#[derive(Debug)]
pub struct ConsoleState {
    /// App whose logs are shown
    pub running_app: Option<RunningApp>,
    pub buffer: LogBuffer,
    pub search: SearchIndex,
    /// Raw search field text; committed to `search` after the debounce
    pub search_input: String,
    pub is_logging: bool,
    /// Set by pause; blocks restarts until resume or an app change
    pub is_paused: bool,
    /// Lines received since the app was selected, including evicted ones
    pub total_received: u64,
    revision: u64,
}

impl ConsoleState {
    pub fn new(buffer_lines: usize) -> Self {
        Self {
            running_app: None,
            buffer: LogBuffer::new(buffer_lines),
            search: SearchIndex::new(),
            search_input: String::new(),
            is_logging: false,
            is_paused: false,
            total_received: 0,
            revision: 0,
        }
    }

    /// Clear everything tied to the previous app
    pub fn reset_for_app(&mut self, app: Option<RunningApp>) {
        self.running_app = app;
        self.buffer.clear();
        self.search.reset();
        self.search_input.clear();
        self.is_paused = false;
        self.total_received = 0;
    }

    /// Append a line and keep the search selection on the same logical line
    pub fn push_line(&mut self, event: LogEvent) {
        let evicted = self.buffer.push(event);
        self.total_received += 1;
        self.search.recompute(self.buffer.texts(), true, evicted);
    }

    /// Apply the raw input if it differs from the committed query
    pub fn commit_search_input(&mut self) {
        if self.search_input != self.search.query() {
            self.search.set_query(&self.search_input, self.buffer.texts());
        }
    }

    pub fn bump_revision(&mut self) {
        self.revision += 1;
    }

    pub fn snapshot(&self) -> ConsoleSnapshot {
        ConsoleSnapshot {
            revision: self.revision,
            running_app: self.running_app.clone(),
            lines: self.buffer.iter().cloned().collect(),
            total_received: self.total_received,
            search_query: self.search.query().to_string(),
            search_input: self.search_input.clone(),
            matches: self.search.matches().to_vec(),
            current_match: self.search.pointer(),
            current_line: self.search.current_line(),
            navigation_tick: self.search.navigation_tick(),
            is_logging: self.is_logging,
            is_paused: self.is_paused,
        }
    }
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self::new(mdeck_core::DEFAULT_BUFFER_LINES)
    }
}

/// Point-in-time copy of the console for rendering
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsoleSnapshot {
    /// Increments on every processed message
    pub revision: u64,
    pub running_app: Option<RunningApp>,
    pub lines: Vec<LogEvent>,
    pub total_received: u64,
    pub search_query: String,
    pub search_input: String,
    pub matches: Vec<usize>,
    pub current_match: Option<usize>,
    pub current_line: Option<usize>,
    pub navigation_tick: u64,
    pub is_logging: bool,
    pub is_paused: bool,
}

impl ConsoleSnapshot {
    /// Lines received after `seen` total lines, limited to what is still buffered
    pub fn lines_since(&self, seen: u64) -> &[LogEvent] {
        let new = self.total_received.saturating_sub(seen);
        let new = usize::try_from(new).unwrap_or(usize::MAX).min(self.lines.len());
        &self.lines[self.lines.len() - new..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdeck_core::Platform;

    fn line(text: &str) -> LogEvent {
        LogEvent::output(Platform::IOS, text)
    }

    #[test]
    fn test_push_line_keeps_selection_across_eviction() {
        let mut state = ConsoleState::new(500);
        for i in 0..500 {
            state.push_line(line(&format!("line {}", i)));
        }
        state.search_input = "line 499".into();
        state.commit_search_input();
        assert_eq!(state.search.current_line(), Some(499));

        state.push_line(line("line 500"));

        assert_eq!(state.buffer.len(), 500);
        assert_eq!(state.search.current_line(), Some(498));
        assert_eq!(state.total_received, 501);
    }

    #[test]
    fn test_commit_is_noop_for_same_query() {
        let mut state = ConsoleState::new(10);
        for text in ["abc-1", "other", "abc-2"] {
            state.push_line(line(text));
        }
        state.search_input = "abc".into();
        state.commit_search_input();
        state.search.submit();
        let pointer = state.search.pointer();

        state.commit_search_input();
        assert_eq!(state.search.pointer(), pointer);
    }

    #[test]
    fn test_lines_since() {
        let mut state = ConsoleState::new(3);
        for i in 0..5 {
            state.push_line(line(&format!("{}", i)));
        }
        let snapshot = state.snapshot();

        let texts = |seen| -> Vec<String> {
            snapshot
                .lines_since(seen)
                .iter()
                .map(|e| e.text.clone())
                .collect()
        };
        assert_eq!(texts(4), vec!["4"]);
        assert_eq!(texts(0), vec!["2", "3", "4"]);
        assert!(texts(5).is_empty());
    }
}
