//! # mdeck-daemon - Platform Tool Execution
//!
//! Runs `xcrun simctl`, `adb`, `emulator` and the bundle inspection tools,
//! and parses what they print. Nothing in here keeps long-lived state except
//! the streaming plumbing in [`process`].
//!
//! Depends on [`mdeck_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Process Execution
//! - [`ProcessRunner`] - Seam for running, spawning and streaming tools
//! - [`SystemRunner`] - Real implementation over `tokio::process`
//! - [`LineStream`] / [`StreamControl`] - Cancellable line output
//! - [`ToolLocator`] - Finds executables in the SDK, Xcode and `PATH`
//!
//! ### Command Lines
//! - [`commands`] - One builder per tool invocation, plus [`LaunchOptions`]
//!
//! ### Output Parsing
//! - [`parse_simctl_devices()`], [`classify_simulators()`] - iOS discovery
//! - [`parse_adb_devices()`], [`reconcile_emulators()`] - Android discovery
//! - [`packages`] - APK and Info.plist identity, `pidof` output
//!
//! ### Environment
//! - [`ToolAvailability`] - Which toolchains are usable
//! - [`PlatformInstaller`] - Downloads the iOS platform

pub mod avds;
pub mod commands;
pub mod devices;
pub mod installer;
pub mod locate;
pub mod packages;
pub mod process;
pub mod simctl;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod tool_availability;

pub use avds::{parse_avd_list, parse_running_avd_name, reconcile_emulators};
pub use commands::{Invocation, LaunchOptions, Tool};
pub use devices::{only_emulators, parse_adb_devices};
pub use installer::PlatformInstaller;
pub use locate::{LocatorConfig, ToolLocator};
pub use process::{
    line_channel, LineSink, LineStream, LocalProcessRunner, ProcessRunner, StreamControl,
    SystemRunner,
};
pub use simctl::{classify_simulators, parse_simctl_devices};
pub use tool_availability::ToolAvailability;
