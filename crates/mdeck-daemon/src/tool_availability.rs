//! Tool availability checking for device management
//!
//! Reports whether the iOS toolchain (Xcode, Simulator.app, `simctl`) and the
//! Android tools (`adb`, `emulator`) are usable on this machine.

use std::path::{Path, PathBuf};

use mdeck_core::prelude::*;

use crate::commands::{simctl, Tool};
use crate::locate::ToolLocator;
use crate::process::ProcessRunner;

const XCODE_APP: &str = "/Applications/Xcode.app";
const SIMULATOR_APP: &str = "/Applications/Xcode.app/Contents/Developer/Applications/Simulator.app";

/// Snapshot of installed developer tools
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolAvailability {
    pub xcode_installed: bool,
    pub simulator_app_available: bool,
    /// `xcrun simctl help` ran successfully
    pub simctl_available: bool,
    pub adb_path: Option<PathBuf>,
    pub emulator_path: Option<PathBuf>,
}

impl ToolAvailability {
    /// Check tool availability (run once at startup or on demand)
    pub async fn check<R: ProcessRunner + Sync>(runner: &R, locator: &ToolLocator) -> Self {
        let simctl_available = match runner.run(&simctl::help()).await {
            Ok(_) => true,
            Err(e) => {
                debug!("xcrun simctl check failed: {}", e);
                false
            }
        };

        let availability = Self {
            xcode_installed: Path::new(XCODE_APP).exists(),
            simulator_app_available: Path::new(SIMULATOR_APP).exists(),
            simctl_available,
            adb_path: locator.resolve(Tool::Adb).ok(),
            emulator_path: locator.resolve(Tool::Emulator).ok(),
        };

        info!(
            "Tool availability: ios_ready={}, adb={:?}, emulator={:?}",
            availability.is_ios_ready(),
            availability.adb_path,
            availability.emulator_path
        );
        availability
    }

    pub fn is_ios_ready(&self) -> bool {
        self.xcode_installed && self.simulator_app_available && self.simctl_available
    }

    pub fn is_android_ready(&self) -> bool {
        self.adb_path.is_some() && self.emulator_path.is_some()
    }

    /// One-line summary of the iOS toolchain state, naming the first missing piece
    pub fn ios_detail_message(&self) -> &'static str {
        if self.is_ios_ready() {
            "iOS development environment is ready."
        } else if !self.xcode_installed {
            if cfg!(target_os = "macos") {
                "Xcode is not installed. Install Xcode to manage iOS simulators."
            } else {
                "iOS simulators are only available on macOS."
            }
        } else if !self.simulator_app_available {
            "Simulator.app was not found inside Xcode."
        } else {
            "xcrun simctl is not working."
        }
    }

    /// Get user-friendly message for unavailable Android tools
    pub fn android_unavailable_message(&self) -> Option<&'static str> {
        match (&self.adb_path, &self.emulator_path) {
            (Some(_), Some(_)) => None,
            (None, _) => {
                Some("adb not found. Set ANDROID_HOME or ANDROID_SDK_ROOT, or install Android Studio.")
            }
            (Some(_), None) => Some("Android emulator not found. Install it via the SDK Manager."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_ios() -> ToolAvailability {
        ToolAvailability {
            xcode_installed: true,
            simulator_app_available: true,
            simctl_available: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_tool_availability_default() {
        let availability = ToolAvailability::default();
        assert!(!availability.is_ios_ready());
        assert!(!availability.is_android_ready());
        assert!(availability.android_unavailable_message().is_some());
    }

    #[test]
    fn test_ios_detail_message_names_first_missing_piece() {
        assert_eq!(
            ready_ios().ios_detail_message(),
            "iOS development environment is ready."
        );

        let no_simulator = ToolAvailability {
            simulator_app_available: false,
            ..ready_ios()
        };
        assert!(no_simulator.ios_detail_message().contains("Simulator.app"));

        let no_simctl = ToolAvailability {
            simctl_available: false,
            ..ready_ios()
        };
        assert!(no_simctl.ios_detail_message().contains("simctl"));
    }

    #[test]
    fn test_android_messages() {
        let only_adb = ToolAvailability {
            adb_path: Some(PathBuf::from("/sdk/platform-tools/adb")),
            ..Default::default()
        };
        assert!(only_adb
            .android_unavailable_message()
            .is_some_and(|m| m.contains("emulator")));

        let both = ToolAvailability {
            emulator_path: Some(PathBuf::from("/sdk/emulator/emulator")),
            ..only_adb
        };
        assert!(both.is_android_ready());
        assert_eq!(both.android_unavailable_message(), None);
    }
}
