//! Command-line builders for the platform tools
//!
//! Every external call is described as an [`Invocation`] (tool + argument
//! list) before anything is spawned, so argument construction and validation
//! stay pure and testable.

use std::fmt;
use std::path::{Path, PathBuf};

use mdeck_core::prelude::*;

/// External executables the engine knows how to locate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Xcrun,
    Adb,
    Emulator,
    ApkAnalyzer,
    Aapt,
    Plutil,
    Xcodebuild,
    Open,
}

impl Tool {
    /// Executable file name
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Xcrun => "xcrun",
            Tool::Adb => "adb",
            Tool::Emulator => "emulator",
            Tool::ApkAnalyzer => "apkanalyzer",
            Tool::Aapt => "aapt",
            Tool::Plutil => "plutil",
            Tool::Xcodebuild => "xcodebuild",
            Tool::Open => "open",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully built command line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Invocation {
    pub tool: Tool,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(tool: Tool, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tool,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tool)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// iOS launch options
// ─────────────────────────────────────────────────────────────────────────────

/// Flags for `simctl launch`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub wait_for_debugger: bool,
    /// Attach the app's stdout/stderr to the launching process
    pub console: bool,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
    pub terminate_running_process: bool,
    /// Extra arguments passed to the app after the bundle id
    pub arguments: Vec<String>,
}

impl LaunchOptions {
    /// Reject option combinations the launcher cannot honour.
    ///
    /// `console` and file redirection are mutually exclusive.
    pub fn validate(&self) -> Result<()> {
        if self.console && (self.stdout_path.is_some() || self.stderr_path.is_some()) {
            return Err(Error::invalid_arguments(
                "--console cannot be combined with --stdout/--stderr redirection",
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// simctl (via xcrun)
// ─────────────────────────────────────────────────────────────────────────────

pub mod simctl {
    use super::*;

    fn simctl<I, S>(args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = vec!["simctl".to_string()];
        all.extend(args.into_iter().map(Into::into));
        Invocation::new(Tool::Xcrun, all)
    }

    pub fn help() -> Invocation {
        simctl(["help"])
    }

    pub fn list_devices() -> Invocation {
        simctl(["list", "devices", "--json"])
    }

    pub fn boot(udid: &str) -> Invocation {
        simctl(["boot", udid])
    }

    /// Blocks until the device has finished booting (`-b` boots it if needed)
    pub fn boot_status(udid: &str) -> Invocation {
        simctl(["bootstatus", udid, "-b"])
    }

    pub fn shutdown(udid: &str) -> Invocation {
        simctl(["shutdown", udid])
    }

    pub fn install(udid: &str, app_path: &Path) -> Invocation {
        simctl(["install".to_string(), udid.to_string(), path_arg(app_path)])
    }

    /// Build `simctl launch`, validating `options` first.
    pub fn launch(udid: &str, bundle_id: &str, options: &LaunchOptions) -> Result<Invocation> {
        options.validate()?;

        let mut args = vec!["launch".to_string()];
        if options.wait_for_debugger {
            args.push("--wait-for-debugger".to_string());
        }
        if options.console {
            args.push("--console".to_string());
        } else {
            if let Some(path) = &options.stdout_path {
                args.push(format!("--stdout={}", path.display()));
            }
            if let Some(path) = &options.stderr_path {
                args.push(format!("--stderr={}", path.display()));
            }
        }
        if options.terminate_running_process {
            args.push("--terminate-running-process".to_string());
        }
        args.push(udid.to_string());
        args.push(bundle_id.to_string());
        args.extend(options.arguments.iter().cloned());

        Ok(simctl(args))
    }

    /// `log stream` inside the simulator, compact style, debug level
    pub fn log_stream(udid: &str, predicate: Option<&str>) -> Invocation {
        let mut args: Vec<String> = [
            "spawn", udid, "log", "stream", "--style", "compact", "--level", "debug",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if let Some(predicate) = predicate {
            args.push("--predicate".to_string());
            args.push(predicate.to_string());
        }
        simctl(args)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// adb
// ─────────────────────────────────────────────────────────────────────────────

pub mod adb {
    use super::*;

    fn on_device<I, S>(serial: &str, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = vec!["-s".to_string(), serial.to_string()];
        all.extend(args.into_iter().map(Into::into));
        Invocation::new(Tool::Adb, all)
    }

    pub fn start_server() -> Invocation {
        Invocation::new(Tool::Adb, ["start-server"])
    }

    pub fn devices() -> Invocation {
        Invocation::new(Tool::Adb, ["devices", "-l"])
    }

    pub fn emu_kill(serial: &str) -> Invocation {
        on_device(serial, ["emu", "kill"])
    }

    pub fn emu_avd_name(serial: &str) -> Invocation {
        on_device(serial, ["emu", "avd", "name"])
    }

    pub fn install(serial: &str, apk_path: &Path) -> Invocation {
        on_device(
            serial,
            ["install".to_string(), "-r".to_string(), path_arg(apk_path)],
        )
    }

    /// Launch the package's default activity through the monkey tool
    pub fn launch(serial: &str, package: &str) -> Invocation {
        on_device(serial, ["shell", "monkey", "-p", package, "1"])
    }

    pub fn pidof(serial: &str, package: &str) -> Invocation {
        on_device(serial, ["shell", "pidof", package])
    }

    pub fn logcat(serial: &str, pid: &str) -> Invocation {
        on_device(
            serial,
            [
                "logcat".to_string(),
                format!("--pid={}", pid),
                "-v".to_string(),
                "threadtime".to_string(),
            ],
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// emulator
// ─────────────────────────────────────────────────────────────────────────────

pub mod emulator {
    use super::*;

    pub fn list_avds() -> Invocation {
        Invocation::new(Tool::Emulator, ["-list-avds"])
    }

    pub fn boot(avd_name: &str) -> Invocation {
        Invocation::new(Tool::Emulator, ["-avd", avd_name])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Bundle inspection and platform install helpers
// ─────────────────────────────────────────────────────────────────────────────

pub mod inspect {
    use super::*;

    pub fn apk_application_id(apk_path: &Path) -> Invocation {
        Invocation::new(
            Tool::ApkAnalyzer,
            [
                "manifest".to_string(),
                "application-id".to_string(),
                path_arg(apk_path),
            ],
        )
    }

    pub fn aapt_badging(apk_path: &Path) -> Invocation {
        Invocation::new(
            Tool::Aapt,
            ["dump".to_string(), "badging".to_string(), path_arg(apk_path)],
        )
    }

    /// Convert any plist (binary or XML) to JSON on stdout
    pub fn plist_to_json(plist_path: &Path) -> Invocation {
        Invocation::new(
            Tool::Plutil,
            [
                "-convert".to_string(),
                "json".to_string(),
                "-o".to_string(),
                "-".to_string(),
                path_arg(plist_path),
            ],
        )
    }
}

pub mod platform {
    use super::*;

    /// App Store page for Xcode
    pub const XCODE_STORE_URL: &str = "macappstore://itunes.apple.com/app/id497799835";

    pub fn download_ios_platform() -> Invocation {
        Invocation::new(Tool::Xcodebuild, ["-downloadPlatform", "iOS"])
    }

    pub fn open_url(url: &str) -> Invocation {
        Invocation::new(Tool::Open, [url])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simctl_arguments() {
        assert_eq!(
            simctl::list_devices().args,
            vec!["simctl", "list", "devices", "--json"]
        );
        assert_eq!(
            simctl::boot_status("U-1").args,
            vec!["simctl", "bootstatus", "U-1", "-b"]
        );
        assert_eq!(
            simctl::install("U-1", Path::new("/tmp/Demo.app")).args,
            vec!["simctl", "install", "U-1", "/tmp/Demo.app"]
        );
        assert_eq!(simctl::shutdown("U-1").tool, Tool::Xcrun);
    }

    #[test]
    fn test_simctl_launch_full_flags() {
        let options = LaunchOptions {
            wait_for_debugger: true,
            stdout_path: Some(PathBuf::from("/tmp/out.log")),
            stderr_path: Some(PathBuf::from("/tmp/err.log")),
            terminate_running_process: true,
            arguments: vec!["-debug".to_string()],
            ..Default::default()
        };
        let invocation = simctl::launch("U-1", "com.example.demo", &options).unwrap();
        assert_eq!(
            invocation.args,
            vec![
                "simctl",
                "launch",
                "--wait-for-debugger",
                "--stdout=/tmp/out.log",
                "--stderr=/tmp/err.log",
                "--terminate-running-process",
                "U-1",
                "com.example.demo",
                "-debug",
            ]
        );
    }

    #[test]
    fn test_simctl_launch_console() {
        let options = LaunchOptions {
            console: true,
            ..Default::default()
        };
        let invocation = simctl::launch("U-1", "com.example.demo", &options).unwrap();
        assert_eq!(
            invocation.args,
            vec!["simctl", "launch", "--console", "U-1", "com.example.demo"]
        );
    }

    #[test]
    fn test_console_with_redirection_is_invalid() {
        let with_stdout = LaunchOptions {
            console: true,
            stdout_path: Some(PathBuf::from("/tmp/out.log")),
            ..Default::default()
        };
        let with_stderr = LaunchOptions {
            console: true,
            stderr_path: Some(PathBuf::from("/tmp/err.log")),
            ..Default::default()
        };
        assert!(matches!(
            simctl::launch("U", "B", &with_stdout),
            Err(Error::InvalidArguments { .. })
        ));
        assert!(matches!(
            with_stderr.validate(),
            Err(Error::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_log_stream_arguments() {
        assert_eq!(
            simctl::log_stream("U-1", Some("process == \"Demo\"")).args,
            vec![
                "simctl",
                "spawn",
                "U-1",
                "log",
                "stream",
                "--style",
                "compact",
                "--level",
                "debug",
                "--predicate",
                "process == \"Demo\"",
            ]
        );
        assert!(!simctl::log_stream("U-1", None)
            .args
            .contains(&"--predicate".to_string()));
    }

    #[test]
    fn test_adb_arguments() {
        assert_eq!(
            adb::install("emu-1", Path::new("/tmp/app.apk")).args,
            vec!["-s", "emu-1", "install", "-r", "/tmp/app.apk"]
        );
        assert_eq!(
            adb::launch("emu-1", "com.example.app").args,
            vec!["-s", "emu-1", "shell", "monkey", "-p", "com.example.app", "1"]
        );
        assert_eq!(
            adb::emu_kill("emulator-5554").args,
            vec!["-s", "emulator-5554", "emu", "kill"]
        );
        assert_eq!(
            adb::pidof("emulator-5554", "com.example.app").args,
            vec!["-s", "emulator-5554", "shell", "pidof", "com.example.app"]
        );
        assert_eq!(
            adb::logcat("emulator-5554", "12345").args,
            vec!["-s", "emulator-5554", "logcat", "--pid=12345", "-v", "threadtime"]
        );
        assert_eq!(adb::devices().args, vec!["devices", "-l"]);
    }

    #[test]
    fn test_emulator_arguments() {
        let boot = emulator::boot("Pixel_8_API_34");
        assert_eq!(boot.tool, Tool::Emulator);
        assert_eq!(boot.args, vec!["-avd", "Pixel_8_API_34"]);
        assert_eq!(emulator::list_avds().args, vec!["-list-avds"]);
    }

    #[test]
    fn test_invocation_display() {
        assert_eq!(
            adb::emu_avd_name("emulator-5554").to_string(),
            "adb -s emulator-5554 emu avd name"
        );
    }
}
