//! Executable resolution for the platform tools
//!
//! Android tools are looked up under the SDK roots first (explicit setting,
//! `ANDROID_SDK_ROOT`, `ANDROID_HOME`, then the per-OS default install
//! location), Apple tools at their fixed `/usr/bin` locations, and every tool
//! falls back to `PATH`. Candidates are deduplicated and only a path that is
//! an executable file on disk is returned.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use mdeck_core::prelude::*;

use crate::commands::Tool;

/// User overrides for tool lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocatorConfig {
    /// Consulted before `ANDROID_SDK_ROOT` / `ANDROID_HOME`
    pub android_sdk_root: Option<PathBuf>,
    /// Replaces the default `/usr/bin/xcrun` candidate
    pub xcrun_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    config: LocatorConfig,
}

impl ToolLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Resolve `tool` to an executable path.
    pub fn resolve(&self, tool: Tool) -> Result<PathBuf> {
        let candidates = self.candidates(tool);
        trace!("{} candidates: {:?}", tool, candidates);

        candidates
            .into_iter()
            .find(|path| is_executable_file(path))
            .inspect(|path| debug!("Resolved {} to {}", tool, path.display()))
            .ok_or_else(|| Error::tool_not_found(tool.name()))
    }

    /// Every path that could hold `tool`, in priority order, deduplicated
    pub fn candidates(&self, tool: Tool) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        match tool {
            Tool::Adb | Tool::Emulator | Tool::ApkAnalyzer | Tool::Aapt => {
                for root in self.sdk_roots() {
                    paths.extend(sdk_tool_paths(&root, tool));
                }
            }
            Tool::Xcrun => match &self.config.xcrun_path {
                Some(path) => paths.push(path.clone()),
                None => paths.push(PathBuf::from("/usr/bin/xcrun")),
            },
            Tool::Plutil | Tool::Xcodebuild | Tool::Open => {
                paths.push(Path::new("/usr/bin").join(tool.name()));
            }
        }

        if let Ok(found) = which::which_all(tool.name()) {
            paths.extend(found);
        }

        dedup_paths(paths)
    }

    /// Android SDK roots in lookup order
    pub fn sdk_roots(&self) -> Vec<PathBuf> {
        sdk_roots_from(
            self.config.android_sdk_root.as_deref(),
            std::env::var_os("ANDROID_SDK_ROOT").map(PathBuf::from),
            std::env::var_os("ANDROID_HOME").map(PathBuf::from),
            default_sdk_root(),
        )
    }
}

fn sdk_roots_from(
    configured: Option<&Path>,
    sdk_root_env: Option<PathBuf>,
    android_home_env: Option<PathBuf>,
    default_root: Option<PathBuf>,
) -> Vec<PathBuf> {
    let roots = [
        configured.map(Path::to_path_buf),
        sdk_root_env,
        android_home_env,
        default_root,
    ];

    let roots = roots
        .into_iter()
        .flatten()
        .filter_map(|root| {
            let text = root.to_string_lossy();
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
        })
        .collect();

    dedup_paths(roots)
}

/// Default Android Studio SDK location for the current OS
fn default_sdk_root() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir().map(|home| home.join("Library/Android/sdk"))
    }

    #[cfg(target_os = "windows")]
    {
        dirs::data_local_dir().map(|local| local.join("Android").join("Sdk"))
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        dirs::home_dir().map(|home| home.join("Android").join("Sdk"))
    }
}

fn exe(name: &str) -> String {
    format!("{}{}", name, std::env::consts::EXE_SUFFIX)
}

fn sdk_tool_paths(root: &Path, tool: Tool) -> Vec<PathBuf> {
    match tool {
        Tool::Adb => vec![root.join("platform-tools").join(exe("adb"))],
        Tool::Emulator => vec![root.join("emulator").join(exe("emulator"))],
        Tool::ApkAnalyzer => {
            let script = if cfg!(windows) {
                "apkanalyzer.bat"
            } else {
                "apkanalyzer"
            };
            vec![
                root.join("cmdline-tools").join("latest").join("bin").join(script),
                root.join("tools").join("bin").join(script),
            ]
        }
        Tool::Aapt => build_tools_dirs(root)
            .into_iter()
            .map(|dir| dir.join(exe("aapt")))
            .collect(),
        _ => Vec::new(),
    }
}

/// `build-tools/<version>` directories, newest version first
fn build_tools_dirs(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(root.join("build-tools")) else {
        return Vec::new();
    };

    let mut dirs: Vec<(Vec<u32>, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .map(|path| {
            let version = path
                .file_name()
                .map(|name| version_key(&name.to_string_lossy()))
                .unwrap_or_default();
            (version, path)
        })
        .collect();

    dirs.sort_by(|a, b| b.0.cmp(&a.0));
    dirs.into_iter().map(|(_, path)| path).collect()
}

fn version_key(version: &str) -> Vec<u32> {
    version
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|part| part.parse().ok())
        .collect()
}

/// Drop later duplicates, comparing canonical forms when they exist
fn dedup_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|path| {
            let key = dunce::canonicalize(path).unwrap_or_else(|_| path.clone());
            seen.insert(key)
        })
        .collect()
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}
