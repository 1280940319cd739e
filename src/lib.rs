//! mobile-deck library
//!
//! The `mdeck` command line front end over [`mdeck_app::Orchestrator`].

pub mod cli;
pub mod commands;
pub mod headless;

pub use cli::Cli;
pub use commands::execute;
pub use headless::{HeadlessEvent, Reporter};
