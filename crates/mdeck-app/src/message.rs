//! Message types for the log console (TEA pattern)

use mdeck_core::{LogEvent, RunningApp};

/// Inputs to [`crate::handler::update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // ─────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────
    /// The shared running app changed (or was cleared)
    RunningAppChanged(Option<RunningApp>),

    // ─────────────────────────────────────────────────────────
    // Stream Events
    // ─────────────────────────────────────────────────────────
    LogReceived(LogEvent),
    /// The active stream ended on its own
    LoggingStopped { failed: bool },

    // ─────────────────────────────────────────────────────────
    // User Controls
    // ─────────────────────────────────────────────────────────
    /// Stop streaming and stay stopped until [`Message::Resume`]
    Pause,
    Resume,
    /// Drop buffered lines; streaming continues
    Clear,

    // ─────────────────────────────────────────────────────────
    // Search
    // ─────────────────────────────────────────────────────────
    /// Raw keystrokes; applied after the debounce
    SearchInputChanged(String),
    /// Debounce elapsed for this input
    ApplySearchQuery(String),
    /// Move toward older matches
    SearchSubmitted,
    /// Move toward newer matches
    SearchPrevious,
}
