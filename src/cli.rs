//! Command-line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use mdeck_core::Platform;
use mdeck_daemon::LaunchOptions;

/// mobile-deck - iOS simulators and Android emulators from one place
#[derive(Parser, Debug)]
#[command(name = "mdeck", version)]
#[command(about = "Manage iOS simulators and Android emulators and stream app logs", long_about = None)]
pub struct Cli {
    /// Emit NDJSON events instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (defaults to <config_dir>/mobile-deck/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List booted and shutdown devices
    Devices {
        #[arg(long, value_enum)]
        platform: Option<PlatformArg>,
    },

    /// Boot a simulator (UDID) or emulator (serial or avd:<name>)
    Boot { id: String },

    /// Shut down a running simulator or emulator
    Shutdown { id: String },

    /// Show the identity of an .app or .apk
    Inspect { path: PathBuf },

    /// Install and launch an app, then stream its logs until Ctrl-C
    Run(RunArgs),

    /// Check which platform toolchains are usable
    Doctor,

    /// Download the iOS simulator platform
    InstallPlatform {
        /// Open the Xcode App Store page instead
        #[arg(long)]
        open_store: bool,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a default config file if none exists
    Init,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformArg {
    Ios,
    Android,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Ios => Platform::IOS,
            PlatformArg::Android => Platform::Android,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// .app directory or .apk file
    pub path: PathBuf,

    /// Simulator UDID (iOS only; defaults to the first booted simulator)
    #[arg(long)]
    pub device: Option<String>,

    /// Highlight lines matching this query
    #[arg(long)]
    pub search: Option<String>,

    #[arg(long)]
    pub wait_for_debugger: bool,

    /// Attach the app's console output to simctl
    #[arg(long, conflicts_with_all = ["stdout", "stderr"])]
    pub console: bool,

    #[arg(long, value_name = "PATH")]
    pub stdout: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    pub stderr: Option<PathBuf>,

    #[arg(long)]
    pub terminate_running_process: bool,

    /// Arguments passed to the app
    #[arg(last = true)]
    pub app_args: Vec<String>,
}

impl RunArgs {
    /// Apply the flags on top of the configured defaults
    pub fn launch_options(&self, defaults: LaunchOptions) -> LaunchOptions {
        LaunchOptions {
            wait_for_debugger: defaults.wait_for_debugger || self.wait_for_debugger,
            console: self.console,
            stdout_path: self.stdout.clone(),
            stderr_path: self.stderr.clone(),
            terminate_running_process: defaults.terminate_running_process
                || self.terminate_running_process,
            arguments: self.app_args.clone(),
        }
    }
}
