//! TEA update function for the log console
//!
//! [`update`] is pure: it changes [`ConsoleState`] and returns the side
//! effects for the console engine to perform.

use mdeck_core::prelude::*;
use mdeck_core::RunningApp;

use crate::log_view_state::ConsoleState;
use crate::message::Message;

/// Side effects the console engine performs after update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateAction {
    /// Start (or restart) streaming logs for the app
    StartLogging(RunningApp),
    /// Stop whichever stream is active
    StopLogging,
    /// Apply this input as the query once the debounce elapses
    ScheduleSearch(String),
    /// Drop a pending debounced query
    CancelSearch,
}

/// Result of processing a message
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Performed in order
    pub actions: Vec<UpdateAction>,
}

impl UpdateResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn action(action: UpdateAction) -> Self {
        Self {
            actions: vec![action],
        }
    }

    pub fn actions(actions: impl IntoIterator<Item = UpdateAction>) -> Self {
        Self {
            actions: actions.into_iter().collect(),
        }
    }
}

/// Process a message and update state
pub fn update(state: &mut ConsoleState, message: Message) -> UpdateResult {
    let result = match message {
        Message::RunningAppChanged(app) => handle_running_app_changed(state, app),

        Message::LogReceived(event) => {
            state.push_line(event);
            UpdateResult::none()
        }

        Message::LoggingStopped { failed } => {
            debug!("Log stream stopped (failed: {})", failed);
            state.is_logging = false;
            UpdateResult::none()
        }

        Message::Pause => {
            if state.is_paused {
                return UpdateResult::none();
            }
            state.is_paused = true;
            state.is_logging = false;
            UpdateResult::action(UpdateAction::StopLogging)
        }

        Message::Resume => {
            if !state.is_paused {
                return UpdateResult::none();
            }
            state.is_paused = false;
            start_logging(state)
        }

        Message::Clear => {
            state.buffer.clear();
            state.search.recompute(state.buffer.texts(), false, 0);
            UpdateResult::none()
        }

        Message::SearchInputChanged(input) => {
            state.search_input = input.clone();
            UpdateResult::action(UpdateAction::ScheduleSearch(input))
        }

        Message::ApplySearchQuery(query) => {
            // A debounce that fired before a newer keystroke or an explicit navigation
            if query != state.search_input || query == state.search.query() {
                return UpdateResult::none();
            }
            state.search.set_query(&query, state.buffer.texts());
            UpdateResult::none()
        }

        Message::SearchSubmitted => {
            state.commit_search_input();
            state.search.submit();
            UpdateResult::action(UpdateAction::CancelSearch)
        }

        Message::SearchPrevious => {
            state.commit_search_input();
            state.search.previous();
            UpdateResult::action(UpdateAction::CancelSearch)
        }
    };
    state.bump_revision();
    result
}

fn handle_running_app_changed(state: &mut ConsoleState, app: Option<RunningApp>) -> UpdateResult {
    if state.running_app == app {
        return UpdateResult::none();
    }

    state.reset_for_app(app);
    if state.running_app.is_none() {
        state.is_logging = false;
        return UpdateResult::actions([UpdateAction::CancelSearch, UpdateAction::StopLogging]);
    }

    let mut actions = vec![UpdateAction::CancelSearch, UpdateAction::StopLogging];
    actions.extend(start_logging(state).actions);
    UpdateResult::actions(actions)
}

fn start_logging(state: &mut ConsoleState) -> UpdateResult {
    match (&state.running_app, state.is_paused) {
        (Some(app), false) => {
            state.is_logging = true;
            UpdateResult::action(UpdateAction::StartLogging(app.clone()))
        }
        _ => UpdateResult::none(),
    }
}
