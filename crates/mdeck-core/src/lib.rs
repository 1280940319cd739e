//! # mdeck-core - Core Domain Types
//!
//! Foundation crate for mobile-deck. Provides the device and app model shared
//! by the iOS simulator and Android emulator pipelines, error handling,
//! logging setup, and the log buffer / search primitives used by the console.
//!
//! This crate has **zero internal dependencies**.
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`Device`] - A simulator or emulator, with [`SimulatorDevice`] / [`EmulatorDevice`] variants
//! - [`DeviceSnapshot`] - Booted and shutdown devices from one discovery call
//! - [`AppBundle`], [`RunningApp`] - Imported apps and the one currently launched
//! - [`LogEvent`] - A single log line tagged with its platform
//!
//! ### Log Console Primitives
//! - [`LogBuffer`] - Bounded FIFO line buffer
//! - [`SearchIndex`] - Case-insensitive match list with wraparound navigation
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//!
//! ## Prelude
//!
//! ```rust
//! use mdeck_core::prelude::*;
//! ```

pub mod error;
pub mod log_buffer;
pub mod logging;
pub mod prelude;
pub mod search;
pub mod types;

pub use error::{Error, Result};
pub use log_buffer::{LogBuffer, DEFAULT_BUFFER_LINES};
pub use search::SearchIndex;
pub use types::{
    AppBundle, Device, DeviceGroup, DeviceSnapshot, DeviceState, EmulatorDevice, LogEvent,
    LogEventKind, Platform, RunningApp, ShutdownDevices, SimulatorDevice, AVD_SERIAL_PREFIX,
};
