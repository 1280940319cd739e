//! Configuration file parsing for mobile-deck
//!
//! A single `config.toml`, by default in `<config_dir>/mobile-deck/`.

pub mod settings;
pub mod types;

pub use settings::{default_config_path, init_config_dir, load_settings};
pub use types::*;
