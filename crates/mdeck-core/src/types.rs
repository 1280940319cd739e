//! Domain types shared by every mobile-deck crate

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// The two supported virtual-device toolchains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(rename = "ios")]
    IOS,
    Android,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::IOS => write!(f, "iOS"),
            Platform::Android => write!(f, "Android"),
        }
    }
}

/// Power state of a virtual device, as reported by the platform tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceState {
    #[default]
    Shutdown,
    Booted,
}

impl DeviceState {
    /// Map the exact state strings used by `simctl` ("Booted", "Shutdown").
    ///
    /// Transitional states ("Booting", "Shutting Down") are not
    /// recognised; records carrying them are skipped by the caller.
    pub fn from_simctl(raw: &str) -> Option<Self> {
        match raw {
            "Booted" => Some(DeviceState::Booted),
            "Shutdown" => Some(DeviceState::Shutdown),
            _ => None,
        }
    }

    pub fn is_booted(&self) -> bool {
        matches!(self, DeviceState::Booted)
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceState::Shutdown => write!(f, "Shutdown"),
            DeviceState::Booted => write!(f, "Booted"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Devices
// ─────────────────────────────────────────────────────────────────────────────

/// An iOS simulator instance (identity = UDID, stable across boots)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulatorDevice {
    pub udid: String,
    pub name: String,
    /// Friendly OS version, e.g. "iOS 17.2"
    pub os: String,
    pub state: DeviceState,
    pub is_available: bool,
}

/// An Android emulator, running or not
///
/// `serial` is the transient ADB serial while booted (`emulator-5554`) and a
/// synthetic `avd:<name>` identity while shut down. `avd_name` is always valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmulatorDevice {
    pub serial: String,
    pub name: String,
    pub avd_name: String,
    pub state: DeviceState,
    pub api_level: Option<u32>,
}

/// Prefix used for shutdown AVD entries that have no ADB serial
pub const AVD_SERIAL_PREFIX: &str = "avd:";

impl EmulatorDevice {
    pub fn new(serial: impl Into<String>, name: impl Into<String>, state: DeviceState) -> Self {
        let name = name.into();
        Self {
            serial: serial.into(),
            avd_name: name.clone(),
            name,
            state,
            api_level: None,
        }
    }

    /// Synthetic shutdown entry for an AVD image that is not running
    pub fn from_avd(avd_name: &str, api_level: Option<u32>) -> Self {
        Self {
            serial: format!("{}{}", AVD_SERIAL_PREFIX, avd_name),
            name: avd_name.to_string(),
            avd_name: avd_name.to_string(),
            state: DeviceState::Shutdown,
            api_level,
        }
    }

    pub fn with_avd_name(mut self, avd_name: impl Into<String>) -> Self {
        let avd_name = avd_name.into();
        self.name = avd_name.clone();
        self.avd_name = avd_name;
        self
    }

    pub fn display_name(&self) -> String {
        self.avd_name.replace('_', " ")
    }

    /// Whether `serial` is a real ADB serial (only true while running)
    pub fn has_adb_serial(&self) -> bool {
        !self.serial.starts_with(AVD_SERIAL_PREFIX)
    }
}

/// A virtual device from either toolchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Device {
    Simulator(SimulatorDevice),
    Emulator(EmulatorDevice),
}

impl Device {
    /// Identity within the platform snapshot (UDID or ADB serial / `avd:` id)
    pub fn id(&self) -> &str {
        match self {
            Device::Simulator(s) => &s.udid,
            Device::Emulator(e) => &e.serial,
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            Device::Simulator(_) => Platform::IOS,
            Device::Emulator(_) => Platform::Android,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Device::Simulator(s) => s.name.clone(),
            Device::Emulator(e) => e.display_name(),
        }
    }

    /// "iOS 17.2" for simulators, "API 34" for emulators when known
    pub fn os_or_api_level(&self) -> Option<String> {
        match self {
            Device::Simulator(s) => Some(s.os.clone()),
            Device::Emulator(e) => e.api_level.map(|api| format!("API {}", api)),
        }
    }

    pub fn state(&self) -> DeviceState {
        match self {
            Device::Simulator(s) => s.state,
            Device::Emulator(e) => e.state,
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            Device::Simulator(s) => s.is_available,
            Device::Emulator(_) => true,
        }
    }

    /// Handle the platform tool needs to boot this device (UDID or AVD name)
    pub fn boot_handle(&self) -> &str {
        match self {
            Device::Simulator(s) => &s.udid,
            Device::Emulator(e) => &e.avd_name,
        }
    }

    pub fn as_simulator(&self) -> Option<&SimulatorDevice> {
        match self {
            Device::Simulator(s) => Some(s),
            Device::Emulator(_) => None,
        }
    }

    pub fn as_emulator(&self) -> Option<&EmulatorDevice> {
        match self {
            Device::Emulator(e) => Some(e),
            Device::Simulator(_) => None,
        }
    }
}

/// Shutdown simulators sharing one OS version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceGroup {
    pub os: String,
    pub devices: Vec<Device>,
}

/// Shutdown devices: iOS groups them by OS version, Android keeps a flat list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownDevices {
    Grouped(Vec<DeviceGroup>),
    Flat(Vec<Device>),
}

impl ShutdownDevices {
    pub fn iter(&self) -> Box<dyn Iterator<Item = &Device> + '_> {
        match self {
            ShutdownDevices::Grouped(groups) => {
                Box::new(groups.iter().flat_map(|group| group.devices.iter()))
            }
            ShutdownDevices::Flat(devices) => Box::new(devices.iter()),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One point-in-time view of a platform's devices
///
/// Built in one piece by a single discovery call; never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    pub platform: Platform,
    pub booted: Vec<Device>,
    pub shutdown: ShutdownDevices,
}

impl DeviceSnapshot {
    pub fn empty(platform: Platform) -> Self {
        let shutdown = match platform {
            Platform::IOS => ShutdownDevices::Grouped(Vec::new()),
            Platform::Android => ShutdownDevices::Flat(Vec::new()),
        };
        Self {
            platform,
            booted: Vec::new(),
            shutdown,
        }
    }

    /// Every device in the snapshot, booted first
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.booted.iter().chain(self.shutdown.iter())
    }

    pub fn find(&self, id: &str) -> Option<&Device> {
        self.devices().find(|device| device.id() == id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Apps
// ─────────────────────────────────────────────────────────────────────────────

/// An installable app inspected from an imported `.app` directory or `.apk` file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppBundle {
    /// Bundle identifier (iOS) or package name (Android)
    pub id: String,
    pub platform: Platform,
    pub display_name: String,
    pub executable_name: String,
    pub path: PathBuf,
}

/// The app most recently installed and launched
///
/// The sole trigger for (re)starting the log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningApp {
    pub platform: Platform,
    pub bundle_id: String,
    pub process_name: String,
    pub display_name: String,
    pub device_id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Logs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogEventKind {
    /// A line emitted by the streaming tool
    Output,
    /// A synthetic line describing a stream failure
    Error,
}

/// A single log line tagged with its source platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    pub platform: Platform,
    pub kind: LogEventKind,
    pub text: String,
    pub received_at: DateTime<Local>,
}

impl LogEvent {
    pub fn output(platform: Platform, text: impl Into<String>) -> Self {
        Self {
            platform,
            kind: LogEventKind::Output,
            text: text.into(),
            received_at: Local::now(),
        }
    }

    pub fn error(platform: Platform, text: impl Into<String>) -> Self {
        Self {
            platform,
            kind: LogEventKind::Error,
            text: text.into(),
            received_at: Local::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == LogEventKind::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator(udid: &str, state: DeviceState) -> Device {
        Device::Simulator(SimulatorDevice {
            udid: udid.to_string(),
            name: "iPhone 15".to_string(),
            os: "iOS 17.2".to_string(),
            state,
            is_available: true,
        })
    }

    #[test]
    fn test_simctl_state_mapping_is_exact() {
        assert_eq!(DeviceState::from_simctl("Booted"), Some(DeviceState::Booted));
        assert_eq!(DeviceState::from_simctl("Shutdown"), Some(DeviceState::Shutdown));
        assert_eq!(DeviceState::from_simctl("Booting"), None);
        assert_eq!(DeviceState::from_simctl("booted"), None);
    }

    #[test]
    fn test_emulator_display_name_replaces_underscores() {
        let device = EmulatorDevice::from_avd("Pixel_8_API_34", Some(34));
        assert_eq!(device.display_name(), "Pixel 8 API 34");
        assert_eq!(device.serial, "avd:Pixel_8_API_34");
        assert!(!device.has_adb_serial());
    }

    #[test]
    fn test_device_accessors() {
        let emulator = Device::Emulator(
            EmulatorDevice::new("emulator-5554", "sdk_gphone64", DeviceState::Booted)
                .with_avd_name("Pixel_4a"),
        );
        assert_eq!(emulator.id(), "emulator-5554");
        assert_eq!(emulator.boot_handle(), "Pixel_4a");
        assert_eq!(emulator.platform(), Platform::Android);
        assert_eq!(emulator.os_or_api_level(), None);

        let sim = simulator("ABC-123", DeviceState::Shutdown);
        assert_eq!(sim.os_or_api_level().as_deref(), Some("iOS 17.2"));
        assert!(sim.as_emulator().is_none());
    }

    #[test]
    fn test_snapshot_find_covers_booted_and_grouped_shutdown() {
        let snapshot = DeviceSnapshot {
            platform: Platform::IOS,
            booted: vec![simulator("BOOTED", DeviceState::Booted)],
            shutdown: ShutdownDevices::Grouped(vec![DeviceGroup {
                os: "iOS 17.2".to_string(),
                devices: vec![simulator("OFF", DeviceState::Shutdown)],
            }]),
        };

        assert!(snapshot.find("BOOTED").is_some());
        assert!(snapshot.find("OFF").is_some());
        assert!(snapshot.find("MISSING").is_none());
        assert_eq!(snapshot.shutdown.len(), 1);
    }

    #[test]
    fn test_log_event_kinds() {
        assert!(!LogEvent::output(Platform::IOS, "hello").is_error());
        assert!(LogEvent::error(Platform::Android, "boom").is_error());
    }
}
