//! Output events for the `mdeck` CLI
//!
//! With `--json` every event goes to stdout as one NDJSON line carrying an
//! `event` tag and a millisecond `timestamp`. Without it the same events are
//! rendered as plain text.
//!
//! # Example Output
//!
//! ```json
//! {"event":"device_detected","platform":"ios","device_id":"A1","device_name":"iPhone 15","state":"Booted","os":"iOS 17.2","timestamp":1704700001000}
//! {"event":"app_started","platform":"ios","bundle_id":"com.example.demo","device_id":"A1","timestamp":1704700002000}
//! {"event":"log","platform":"ios","kind":"output","message":"hello","matched":false,"timestamp":1704700003000}
//! ```

use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::error;

use mdeck_core::{AppBundle, Device, DeviceState, LogEvent, LogEventKind, Platform, RunningApp};
use mdeck_daemon::ToolAvailability;

/// Events emitted by the CLI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    DeviceDetected {
        platform: Platform,
        device_id: String,
        device_name: String,
        state: DeviceState,
        os: Option<String>,
        timestamp: i64,
    },

    /// A platform's discovery call failed; the other platform is unaffected
    PlatformUnavailable {
        platform: Platform,
        error: String,
        timestamp: i64,
    },

    BootRequested { device_id: String, timestamp: i64 },

    ShutdownCompleted { device_id: String, timestamp: i64 },

    BundleInspected {
        platform: Platform,
        bundle_id: String,
        display_name: String,
        executable_name: String,
        path: String,
        timestamp: i64,
    },

    AppStarted {
        platform: Platform,
        bundle_id: String,
        display_name: String,
        device_id: String,
        timestamp: i64,
    },

    Log {
        platform: Platform,
        kind: LogEventKind,
        message: String,
        /// Line matches the active search query
        matched: bool,
        timestamp: i64,
    },

    SearchUpdated {
        query: String,
        matches: usize,
        timestamp: i64,
    },

    LoggingStopped { timestamp: i64 },

    ToolStatus {
        ios_ready: bool,
        ios_detail: String,
        android_ready: bool,
        android_detail: Option<String>,
        timestamp: i64,
    },

    InstallProgress { line: String, timestamp: i64 },

    ConfigWritten { path: String, timestamp: i64 },

    /// A recoverable problem; the command still exits successfully
    Warning { message: String, timestamp: i64 },

    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn device_detected(device: &Device) -> Self {
        Self::DeviceDetected {
            platform: device.platform(),
            device_id: device.id().to_string(),
            device_name: device.display_name(),
            state: device.state(),
            os: device.os_or_api_level(),
            timestamp: Self::now(),
        }
    }

    pub fn platform_unavailable(platform: Platform, error: &mdeck_core::Error) -> Self {
        Self::PlatformUnavailable {
            platform,
            error: error.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn boot_requested(device_id: &str) -> Self {
        Self::BootRequested {
            device_id: device_id.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn shutdown_completed(device_id: &str) -> Self {
        Self::ShutdownCompleted {
            device_id: device_id.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn bundle_inspected(bundle: &AppBundle) -> Self {
        Self::BundleInspected {
            platform: bundle.platform,
            bundle_id: bundle.id.clone(),
            display_name: bundle.display_name.clone(),
            executable_name: bundle.executable_name.clone(),
            path: bundle.path.display().to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn app_started(app: &RunningApp) -> Self {
        Self::AppStarted {
            platform: app.platform,
            bundle_id: app.bundle_id.clone(),
            display_name: app.display_name.clone(),
            device_id: app.device_id.clone(),
            timestamp: Self::now(),
        }
    }

    /// Uses the time the line was received, not the time it is printed
    pub fn log(event: &LogEvent, matched: bool) -> Self {
        Self::Log {
            platform: event.platform,
            kind: event.kind,
            message: event.text.clone(),
            matched,
            timestamp: event.received_at.timestamp_millis(),
        }
    }

    pub fn search_updated(query: &str, matches: usize) -> Self {
        Self::SearchUpdated {
            query: query.to_string(),
            matches,
            timestamp: Self::now(),
        }
    }

    pub fn logging_stopped() -> Self {
        Self::LoggingStopped {
            timestamp: Self::now(),
        }
    }

    pub fn tool_status(availability: &ToolAvailability) -> Self {
        Self::ToolStatus {
            ios_ready: availability.is_ios_ready(),
            ios_detail: availability.ios_detail_message().to_string(),
            android_ready: availability.is_android_ready(),
            android_detail: availability.android_unavailable_message().map(str::to_string),
            timestamp: Self::now(),
        }
    }

    pub fn install_progress(line: &str) -> Self {
        Self::InstallProgress {
            line: line.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn config_written(path: &Path) -> Self {
        Self::ConfigWritten {
            path: path.display().to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn warning(error: &mdeck_core::Error) -> Self {
        Self::Warning {
            message: error.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn error(error: &mdeck_core::Error) -> Self {
        Self::Error {
            message: error.to_string(),
            fatal: error.is_fatal(),
            timestamp: Self::now(),
        }
    }

    /// Plain-text rendering used without `--json`
    pub fn to_text(&self) -> String {
        match self {
            Self::DeviceDetected {
                platform,
                device_id,
                device_name,
                state,
                os,
                ..
            } => {
                let os = os.as_deref().map(|os| format!(" ({})", os)).unwrap_or_default();
                format!(
                    "{:<8} {:<8} {}{}  [{}]",
                    platform.to_string(),
                    state.to_string(),
                    device_name,
                    os,
                    device_id
                )
            }
            Self::PlatformUnavailable {
                platform, error, ..
            } => format!("{} unavailable: {}", platform, error),
            Self::BootRequested { device_id, .. } => format!("Booting {}", device_id),
            Self::ShutdownCompleted { device_id, .. } => format!("Shut down {}", device_id),
            Self::BundleInspected {
                platform,
                bundle_id,
                display_name,
                executable_name,
                path,
                ..
            } => format!(
                "{} ({})\n  platform:   {}\n  executable: {}\n  path:       {}",
                display_name, bundle_id, platform, executable_name, path
            ),
            Self::AppStarted {
                display_name,
                bundle_id,
                device_id,
                ..
            } => format!("Launched {} ({}) on {}", display_name, bundle_id, device_id),
            Self::Log {
                message, matched, ..
            } => {
                if *matched {
                    format!("> {}", message)
                } else {
                    message.clone()
                }
            }
            Self::SearchUpdated { query, matches, .. } => {
                format!("Search \"{}\": {} matching lines", query, matches)
            }
            Self::LoggingStopped { .. } => "Log stream ended".to_string(),
            Self::ToolStatus {
                ios_ready,
                ios_detail,
                android_ready,
                android_detail,
                ..
            } => {
                let android = android_detail
                    .as_deref()
                    .unwrap_or("Android SDK tools are ready.");
                format!(
                    "iOS:     {} {}\nAndroid: {} {}",
                    status_mark(*ios_ready),
                    ios_detail,
                    status_mark(*android_ready),
                    android
                )
            }
            Self::InstallProgress { line, .. } => line.clone(),
            Self::ConfigWritten { path, .. } => format!("Config file: {}", path),
            Self::Warning { message, .. } => format!("Warning: {}", message),
            Self::Error { message, .. } => format!("Error: {}", message),
        }
    }
}

fn status_mark(ready: bool) -> &'static str {
    if ready {
        "ok     "
    } else {
        "missing"
    }
}

/// Writes events as NDJSON or text
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    json: bool,
}

impl Reporter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn emit(&self, event: &HeadlessEvent) {
        let line = if self.json {
            match serde_json::to_string(event) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                    return;
                }
            }
        } else {
            event.to_text()
        };

        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", line) {
            error!("Failed to write event to stdout: {}", e);
            return;
        }
        if let Err(e) = stdout.flush() {
            error!("Failed to flush stdout: {}", e);
        }
    }
}
