//! Configuration types for mobile-deck

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use mdeck_core::DEFAULT_BUFFER_LINES;
use mdeck_daemon::{LaunchOptions, LocatorConfig};

/// Application settings (`<config_dir>/mobile-deck/config.toml`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub android: AndroidSettings,

    #[serde(default)]
    pub ios: IosSettings,

    #[serde(default)]
    pub launch: LaunchSettings,
}

impl Settings {
    /// Executable lookup overrides derived from the `android` and `ios` tables
    pub fn locator_config(&self) -> LocatorConfig {
        LocatorConfig {
            android_sdk_root: self.android.sdk_root.clone(),
            xcrun_path: self.ios.xcrun_path.clone(),
        }
    }

    /// Default launch flags; CLI flags are applied on top
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            wait_for_debugger: self.launch.wait_for_debugger,
            terminate_running_process: self.launch.terminate_running_process,
            ..Default::default()
        }
    }
}

/// Log console settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Lines kept in the console buffer
    #[serde(default = "default_buffer_lines")]
    pub buffer_lines: usize,

    /// Delay between typing a query and applying it
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            buffer_lines: default_buffer_lines(),
            search_debounce_ms: default_search_debounce_ms(),
        }
    }
}

fn default_buffer_lines() -> usize {
    DEFAULT_BUFFER_LINES
}

fn default_search_debounce_ms() -> u64 {
    300
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AndroidSettings {
    /// Checked before `ANDROID_SDK_ROOT` / `ANDROID_HOME`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IosSettings {
    /// Replaces `/usr/bin/xcrun`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xcrun_path: Option<PathBuf>,
}

/// Defaults for `simctl launch`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LaunchSettings {
    #[serde(default)]
    pub wait_for_debugger: bool,

    #[serde(default)]
    pub terminate_running_process: bool,
}
