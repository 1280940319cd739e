//! Log console engine
//!
//! A background task owns the [`ConsoleState`] and both platform log
//! coordinators. It feeds messages from the handle, running-app changes and
//! stream notifications through [`update`], performs the returned actions,
//! and publishes a [`ConsoleSnapshot`] after every message.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use mdeck_core::prelude::*;
use mdeck_core::{LogEvent, Platform, RunningApp};
use mdeck_daemon::ProcessRunner;

use crate::config::LoggingSettings;
use crate::handler::{update, UpdateAction};
use crate::log_stream::{
    failure_line, EmulatorLogSource, LogStreamCoordinator, NotificationReceiver,
    SimulatorLogSource, StreamNotification,
};
use crate::log_view_state::{ConsoleSnapshot, ConsoleState};
use crate::message::Message;

/// One coordinator per platform
pub struct LogStreams<R> {
    pub simulator: LogStreamCoordinator<SimulatorLogSource<R>>,
    pub emulator: LogStreamCoordinator<EmulatorLogSource<R>>,
}

impl<R: ProcessRunner + Sync + 'static> LogStreams<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self {
            simulator: LogStreamCoordinator::new(SimulatorLogSource::new(Arc::clone(&runner))),
            emulator: LogStreamCoordinator::new(EmulatorLogSource::new(runner)),
        }
    }

    async fn start(&self, app: &RunningApp) -> Result<NotificationReceiver> {
        match app.platform {
            Platform::IOS => self.simulator.start(app).await,
            Platform::Android => self.emulator.start(app).await,
        }
    }

    async fn stop(&self) {
        self.simulator.stop().await;
        self.emulator.stop().await;
    }
}

/// Handle to a running console engine
pub struct ConsoleHandle {
    tx: mpsc::UnboundedSender<Message>,
    snapshots: watch::Receiver<ConsoleSnapshot>,
    task: JoinHandle<()>,
}

impl ConsoleHandle {
    pub fn send(&self, message: Message) -> Result<()> {
        self.tx.send(message).map_err(|_| Error::ChannelClosed)
    }

    pub fn snapshots(&self) -> watch::Receiver<ConsoleSnapshot> {
        self.snapshots.clone()
    }

    /// Stop streaming and wait for the engine to exit
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            warn!("Console engine ended abnormally: {}", e);
        }
    }
}

/// Spawn the console engine
///
/// `running_app` is the shared cell the orchestrator writes after each
/// successful launch; the engine restarts logging whenever it changes.
pub fn spawn_console<R: ProcessRunner + Sync + 'static>(
    streams: LogStreams<R>,
    running_app: watch::Receiver<Option<RunningApp>>,
    settings: &LoggingSettings,
) -> ConsoleHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let (search_tx, search_rx) = mpsc::unbounded_channel();
    let state = ConsoleState::new(settings.buffer_lines);
    let (snapshot_tx, snapshots) = watch::channel(state.snapshot());

    let engine = ConsoleEngine {
        state,
        streams,
        notifications: None,
        search_timer: None,
        search_tx,
        debounce: Duration::from_millis(settings.search_debounce_ms),
        snapshots: snapshot_tx,
    };
    let task = tokio::spawn(engine.run(rx, search_rx, running_app));

    ConsoleHandle {
        tx,
        snapshots,
        task,
    }
}

struct ConsoleEngine<R> {
    state: ConsoleState,
    streams: LogStreams<R>,
    notifications: Option<NotificationReceiver>,
    search_timer: Option<JoinHandle<()>>,
    search_tx: mpsc::UnboundedSender<String>,
    debounce: Duration,
    snapshots: watch::Sender<ConsoleSnapshot>,
}

impl<R: ProcessRunner + Sync + 'static> ConsoleEngine<R> {
    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<Message>,
        mut search_rx: mpsc::UnboundedReceiver<String>,
        mut running_app: watch::Receiver<Option<RunningApp>>,
    ) {
        let initial = running_app.borrow_and_update().clone();
        if initial.is_some() {
            self.process(Message::RunningAppChanged(initial)).await;
        }
        let mut watching_app = true;

        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(message) => self.process(message).await,
                    None => break,
                },
                changed = running_app.changed(), if watching_app => match changed {
                    Ok(()) => {
                        let app = running_app.borrow_and_update().clone();
                        self.process(Message::RunningAppChanged(app)).await;
                    }
                    Err(_) => watching_app = false,
                },
                Some(query) = search_rx.recv() => {
                    self.process(Message::ApplySearchQuery(query)).await;
                }
                notification = next_notification(&mut self.notifications) => match notification {
                    Some(StreamNotification::Log(event)) => {
                        self.process(Message::LogReceived(event)).await;
                    }
                    Some(StreamNotification::Stopped { failed }) => {
                        self.notifications = None;
                        self.process(Message::LoggingStopped { failed }).await;
                    }
                    None => self.notifications = None,
                },
            }
        }

        debug!("Console engine shutting down");
        self.cancel_search();
        self.notifications = None;
        self.streams.stop().await;
    }

    /// Run `message` and every follow-up it produces, then publish once
    async fn process(&mut self, message: Message) {
        let mut queue = VecDeque::from([message]);
        while let Some(message) = queue.pop_front() {
            let result = update(&mut self.state, message);
            for action in result.actions {
                queue.extend(self.execute(action).await);
            }
        }
        self.snapshots.send_replace(self.state.snapshot());
    }

    async fn execute(&mut self, action: UpdateAction) -> Vec<Message> {
        match action {
            UpdateAction::StartLogging(app) => match self.streams.start(&app).await {
                Ok(rx) => {
                    self.notifications = Some(rx);
                    Vec::new()
                }
                Err(e) => {
                    self.notifications = None;
                    vec![
                        Message::LogReceived(LogEvent::error(app.platform, failure_line(&e))),
                        Message::LoggingStopped { failed: true },
                    ]
                }
            },
            UpdateAction::StopLogging => {
                self.notifications = None;
                self.streams.stop().await;
                Vec::new()
            }
            UpdateAction::ScheduleSearch(query) => {
                self.cancel_search();
                let tx = self.search_tx.clone();
                let delay = self.debounce;
                self.search_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(query);
                }));
                Vec::new()
            }
            UpdateAction::CancelSearch => {
                self.cancel_search();
                Vec::new()
            }
        }
    }

    fn cancel_search(&mut self) {
        if let Some(timer) = self.search_timer.take() {
            timer.abort();
        }
    }
}

/// Next item from the active stream; pends forever when there is none
async fn next_notification(
    notifications: &mut Option<NotificationReceiver>,
) -> Option<StreamNotification> {
    match notifications {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
