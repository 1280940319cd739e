//! Log streaming for a running app
//!
//! A [`LogStreamSource`] knows how to open the platform's log process for a
//! [`RunningApp`]. The [`LogStreamCoordinator`] owns at most one such stream
//! at a time: starting a new one fully stops the previous process first.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use mdeck_core::prelude::*;
use mdeck_core::{LogEvent, Platform, RunningApp};
use mdeck_daemon::commands::{adb, simctl};
use mdeck_daemon::packages::parse_primary_pid;
use mdeck_daemon::{LineStream, ProcessRunner, StreamControl};

/// Opens the platform log process for an app
#[trait_variant::make(LogStreamSource: Send)]
pub trait LocalLogStreamSource {
    fn platform(&self) -> Platform;

    /// Start the log process; fails if it cannot be started for `app`
    async fn open(&self, app: &RunningApp) -> Result<LineStream>;
}

/// Text of the synthetic line pushed when a stream fails
pub fn failure_line(error: &Error) -> String {
    match error {
        Error::StreamFailure { message } => format!("[error] log stream failed: {}", message),
        other => format!("[error] log stream failed: {}", other),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// iOS
// ─────────────────────────────────────────────────────────────────────────────

/// `simctl spawn <udid> log stream` filtered to the app
pub struct SimulatorLogSource<R> {
    runner: Arc<R>,
}

impl<R> SimulatorLogSource<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }
}

/// `subsystem == "<bundle>" OR process == "<process>"` with both values escaped
pub fn log_predicate(bundle_id: &str, process_name: &str) -> String {
    format!(
        "subsystem == \"{}\" OR process == \"{}\"",
        escape_predicate_value(bundle_id),
        escape_predicate_value(process_name)
    )
}

fn escape_predicate_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl<R: ProcessRunner + Sync + 'static> LogStreamSource for SimulatorLogSource<R> {
    fn platform(&self) -> Platform {
        Platform::IOS
    }

    async fn open(&self, app: &RunningApp) -> Result<LineStream> {
        let predicate = log_predicate(&app.bundle_id, &app.process_name);
        debug!("Simulator log predicate: {}", predicate);
        Ok(self
            .runner
            .stream(&simctl::log_stream(&app.device_id, Some(&predicate))))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Android
// ─────────────────────────────────────────────────────────────────────────────

/// `adb logcat --pid=<pid>` for the app's main process
pub struct EmulatorLogSource<R> {
    runner: Arc<R>,
}

impl<R> EmulatorLogSource<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }
}

impl<R: ProcessRunner + Sync + 'static> LogStreamSource for EmulatorLogSource<R> {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    async fn open(&self, app: &RunningApp) -> Result<LineStream> {
        self.runner.run(&adb::start_server()).await?;

        // pidof exits 1 when nothing matches
        let output = match self
            .runner
            .run(&adb::pidof(&app.device_id, &app.bundle_id))
            .await
        {
            Ok(output) => output,
            Err(Error::NonZeroExit { .. }) => String::new(),
            Err(e) => return Err(e),
        };
        let pid = parse_primary_pid(&output)
            .ok_or_else(|| Error::process_not_running(app.bundle_id.as_str()))?;

        debug!("Streaming logcat for {} (pid {})", app.bundle_id, pid);
        Ok(self.runner.stream(&adb::logcat(&app.device_id, &pid)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Starting,
    Streaming,
    /// The log process ended on its own
    Stopped,
    Failed,
}

/// Delivered to the caller for one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamNotification {
    Log(LogEvent),
    /// Terminal; sent exactly once when the stream ends without an explicit stop
    Stopped { failed: bool },
}

pub type NotificationReceiver = mpsc::UnboundedReceiver<StreamNotification>;

struct ActiveStream {
    control: StreamControl,
    forwarder: JoinHandle<()>,
}

/// Owner of the single active log stream for one platform
pub struct LogStreamCoordinator<S> {
    source: S,
    active: Mutex<Option<ActiveStream>>,
    state: Arc<watch::Sender<StreamState>>,
}

impl<S: LogStreamSource + Sync + 'static> LogStreamCoordinator<S> {
    pub fn new(source: S) -> Self {
        let (state, _) = watch::channel(StreamState::Idle);
        Self {
            source,
            active: Mutex::new(None),
            state: Arc::new(state),
        }
    }

    pub fn platform(&self) -> Platform {
        self.source.platform()
    }

    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    /// Stop any active stream, then start streaming logs for `app`
    ///
    /// A start failure leaves the coordinator in [`StreamState::Failed`] and
    /// is returned to the caller.
    pub async fn start(&self, app: &RunningApp) -> Result<NotificationReceiver> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            Self::teardown(previous).await;
        }

        self.state.send_replace(StreamState::Starting);
        let stream = match self.source.open(app).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to start {} log stream: {}", self.platform(), e);
                self.state.send_replace(StreamState::Failed);
                return Err(e);
            }
        };

        info!(
            "Streaming {} logs for {} on {}",
            self.platform(),
            app.bundle_id,
            app.device_id
        );
        self.state.send_replace(StreamState::Streaming);

        let (tx, rx) = mpsc::unbounded_channel();
        let control = stream.control();
        let forwarder = tokio::spawn(forward_stream(
            stream,
            self.platform(),
            tx,
            Arc::clone(&self.state),
        ));
        *active = Some(ActiveStream { control, forwarder });
        Ok(rx)
    }

    /// Stop the active stream; a no-op when idle
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(previous) => {
                Self::teardown(previous).await;
                self.state.send_replace(StreamState::Idle);
                info!("Stopped {} log stream", self.platform());
            }
            None => {
                if self.state() != StreamState::Idle {
                    self.state.send_replace(StreamState::Idle);
                }
            }
        }
    }

    /// Kill the process and wait until nothing more can be forwarded
    async fn teardown(previous: ActiveStream) {
        previous.control.stop().await;
        if let Err(e) = previous.forwarder.await {
            debug!("Log forwarder ended abnormally: {}", e);
        }
    }
}

async fn forward_stream(
    mut stream: LineStream,
    platform: Platform,
    tx: mpsc::UnboundedSender<StreamNotification>,
    state: Arc<watch::Sender<StreamState>>,
) {
    loop {
        match stream.next_line().await {
            Some(Ok(line)) => {
                trace!("{} log: {}", platform, line);
                let _ = tx.send(StreamNotification::Log(LogEvent::output(platform, line)));
            }
            Some(Err(e)) => {
                let failure = Error::stream_failure(e.to_string());
                warn!("{} {}", platform, failure);
                state.send_replace(StreamState::Failed);
                let _ = tx.send(StreamNotification::Log(LogEvent::error(
                    platform,
                    failure_line(&failure),
                )));
                let _ = tx.send(StreamNotification::Stopped { failed: true });
                return;
            }
            None => {
                if stream.control().is_stopped() {
                    return;
                }
                debug!("{} log stream ended", platform);
                state.send_replace(StreamState::Stopped);
                let _ = tx.send(StreamNotification::Stopped { failed: false });
                return;
            }
        }
    }
}
