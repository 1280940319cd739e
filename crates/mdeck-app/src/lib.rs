//! mdeck-app - Device orchestration and log console for mobile-deck
//!
//! Composes the process layer from `mdeck-daemon` into per-platform device
//! catalogs, the install/launch lifecycle, log stream coordinators and the
//! TEA-style log console. [`Orchestrator`] wires them together for the CLI.

pub mod bundle;
pub mod catalog;
pub mod config;
pub mod console;
pub mod handler;
pub mod lifecycle;
pub mod log_stream;
pub mod log_view_state;
pub mod message;
pub mod orchestrator;

// Re-export primary types
pub use bundle::AppBundleInspector;
pub use catalog::{DeviceCatalog, EmulatorCatalog, SimulatorCatalog};
pub use config::Settings;
pub use console::{spawn_console, ConsoleHandle, LogStreams};
pub use handler::{update, UpdateAction, UpdateResult};
pub use lifecycle::AppLifecycleService;
pub use log_stream::{
    EmulatorLogSource, LogStreamCoordinator, LogStreamSource, SimulatorLogSource, StreamNotification,
    StreamState,
};
pub use log_view_state::{ConsoleSnapshot, ConsoleState};
pub use message::Message;
pub use orchestrator::{DeviceListing, Orchestrator};

// Re-export daemon types for the CLI
pub use mdeck_daemon::{LaunchOptions, SystemRunner, ToolAvailability, ToolLocator};
