//! Settings loader for config.toml

use std::path::{Path, PathBuf};

use mdeck_core::prelude::*;

use super::types::Settings;

const CONFIG_FILENAME: &str = "config.toml";
const APP_DIR: &str = "mobile-deck";

const DEFAULT_CONFIG: &str = r#"# mobile-deck configuration

[logging]
buffer_lines = 500          # Lines kept in the log console
search_debounce_ms = 300    # Delay before a typed search query is applied

[android]
# sdk_root = "/path/to/Android/sdk"   # Checked before ANDROID_SDK_ROOT / ANDROID_HOME

[ios]
# xcrun_path = "/usr/bin/xcrun"

[launch]
wait_for_debugger = false
terminate_running_process = false
"#;

/// `<config_dir>/mobile-deck/config.toml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILENAME))
}

/// Load settings from `path`, or the default location when `None`
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: Option<&Path>) -> Settings {
    let Some(config_path) = path.map(Path::to_path_buf).or_else(default_config_path) else {
        debug!("No config directory available, using defaults");
        return Settings::default();
    };

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Write a commented default config file if none exists
///
/// Returns the config file path.
pub fn init_config_dir(path: Option<&Path>) -> Result<PathBuf> {
    let config_path = path
        .map(Path::to_path_buf)
        .or_else(default_config_path)
        .ok_or_else(|| Error::config("No config directory available on this platform"))?;

    if let Some(dir) = config_path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::config(format!("Failed to create {:?}: {}", dir, e)))?;
        }
    }

    if config_path.exists() {
        debug!("Config file {:?} already exists", config_path);
    } else {
        std::fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Created config file {:?}", config_path);
    }

    Ok(config_path)
}
