//! Android Virtual Device (AVD) parsing and reconciliation
//!
//! ADB only knows about running emulators, the `emulator` tool only about
//! AVD images. These functions merge both views into one [`DeviceSnapshot`]
//! in which a running AVD is listed once, as booted.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use mdeck_core::types::{Device, DeviceSnapshot, EmulatorDevice, Platform, ShutdownDevices};

/// Static regex pattern for extracting API level from AVD names
static API_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_API_(\d+)$").expect("Invalid API pattern regex"));

/// Acknowledgment the emulator console appends to `emu` command replies
const CONTROL_ACK: &str = "OK";

/// Parse the output of `emulator -list-avds`
///
/// Output format is one AVD name per line.
pub fn parse_avd_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// API level from a trailing `_API_<n>` segment
///
/// - "Pixel_6_API_33" -> Some(33)
/// - "Medium_Phone_API_36.1" -> None
pub fn parse_avd_api_level(name: &str) -> Option<u32> {
    API_PATTERN
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse `adb -s <serial> emu avd name`
///
/// The reply is the AVD name followed by an `OK` line, with `\r\n` or bare
/// `\r` separators depending on the emulator version.
pub fn parse_running_avd_name(output: &str) -> Option<String> {
    output
        .split(['\n', '\r'])
        .map(str::trim)
        .find(|line| !line.is_empty() && *line != CONTROL_ACK)
        .and_then(|line| line.split_whitespace().next())
        .map(str::to_string)
}

/// Strip a trailing console acknowledgment from a raw name.
///
/// Only an `OK` separated from the name by a line break or whitespace is
/// removed, so names that merely end in "OK" are left intact.
pub fn strip_control_suffix(name: &str) -> &str {
    let trimmed = name.trim();
    if let Some(head) = trimmed.strip_suffix(CONTROL_ACK) {
        if head.ends_with(|c: char| c.is_whitespace()) {
            return head.trim_end();
        }
    }
    trimmed
}

/// Drop shutdown entries whose name matches any booted device
///
/// Names are compared after [`strip_control_suffix`].
pub fn remove_booted_duplicates(
    booted: &[EmulatorDevice],
    shutdown: Vec<EmulatorDevice>,
) -> Vec<EmulatorDevice> {
    let booted_names: HashSet<&str> = booted
        .iter()
        .flat_map(|device| {
            [
                strip_control_suffix(&device.avd_name),
                strip_control_suffix(&device.name),
            ]
        })
        .collect();

    shutdown
        .into_iter()
        .filter(|device| {
            !booted_names.contains(strip_control_suffix(&device.avd_name))
                && !booted_names.contains(strip_control_suffix(&device.name))
        })
        .collect()
}

/// Keep booted devices whose AVD name is a known image.
///
/// When the AVD list is empty (tool missing or failed) every device is kept.
pub fn filter_booted_devices(
    booted: Vec<EmulatorDevice>,
    avd_names: &[String],
) -> Vec<EmulatorDevice> {
    if avd_names.is_empty() {
        return booted;
    }
    booted
        .into_iter()
        .filter(|device| {
            let name = strip_control_suffix(&device.avd_name);
            avd_names.iter().any(|avd| avd == name)
        })
        .collect()
}

/// Concatenate, keeping the first device seen for each name
pub fn merge_shutdown_devices(
    first: Vec<EmulatorDevice>,
    second: Vec<EmulatorDevice>,
) -> Vec<EmulatorDevice> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|device| seen.insert(device.name.clone()))
        .collect()
}

/// Build the Android snapshot from resolved ADB devices and the AVD list
pub fn reconcile_emulators(connected: Vec<EmulatorDevice>, avd_names: &[String]) -> DeviceSnapshot {
    let (booted, adb_shutdown): (Vec<_>, Vec<_>) = connected
        .into_iter()
        .partition(|device| device.state.is_booted());

    let booted = filter_booted_devices(booted, avd_names);

    let booted_names: HashSet<&str> = booted
        .iter()
        .map(|device| strip_control_suffix(&device.avd_name))
        .collect();

    let shutdown_by_avd: Vec<EmulatorDevice> = avd_names
        .iter()
        .filter(|name| !booted_names.contains(name.as_str()))
        .map(|name| EmulatorDevice::from_avd(name, parse_avd_api_level(name)))
        .collect();

    let shutdown = merge_shutdown_devices(adb_shutdown, shutdown_by_avd);
    let shutdown = remove_booted_duplicates(&booted, shutdown);

    DeviceSnapshot {
        platform: Platform::Android,
        booted: booted.into_iter().map(Device::Emulator).collect(),
        shutdown: ShutdownDevices::Flat(shutdown.into_iter().map(Device::Emulator).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdeck_core::types::DeviceState;

    fn booted(serial: &str, avd: &str) -> EmulatorDevice {
        EmulatorDevice::new(serial, avd, DeviceState::Booted)
    }

    fn shutdown_avd(name: &str) -> EmulatorDevice {
        EmulatorDevice::from_avd(name, None)
    }

    fn names(devices: &[EmulatorDevice]) -> Vec<&str> {
        devices.iter().map(|d| d.avd_name.as_str()).collect()
    }

    #[test]
    fn test_parse_avd_list_output() {
        let output = "Pixel_8_API_34\n  Small_Phone_API_35  \n\n";
        assert_eq!(
            parse_avd_list(output),
            vec!["Pixel_8_API_34", "Small_Phone_API_35"]
        );
    }

    #[test]
    fn test_parse_avd_api_level() {
        assert_eq!(parse_avd_api_level("Pixel_6_API_33"), Some(33));
        assert_eq!(parse_avd_api_level("My_Custom_AVD"), None);
        assert_eq!(parse_avd_api_level("Medium_Phone_API_36.1"), None);
    }

    #[test]
    fn test_parse_running_avd_name_skips_ok_line() {
        assert_eq!(
            parse_running_avd_name("Medium_Phone_API_36.1\nOK\n").as_deref(),
            Some("Medium_Phone_API_36.1")
        );
    }

    #[test]
    fn test_parse_running_avd_name_strips_carriage_return_ok() {
        assert_eq!(
            parse_running_avd_name("Pixel_4a\rOK\r\n").as_deref(),
            Some("Pixel_4a")
        );
    }

    #[test]
    fn test_parse_running_avd_name_none_for_ack_only() {
        assert_eq!(parse_running_avd_name("OK\n\n"), None);
        assert_eq!(parse_running_avd_name(""), None);
    }

    #[test]
    fn test_strip_control_suffix() {
        assert_eq!(strip_control_suffix("Pixel_4a\rOK"), "Pixel_4a");
        assert_eq!(strip_control_suffix("Pixel_4a\r\nOK\r\n"), "Pixel_4a");
        assert_eq!(strip_control_suffix("Pixel_4a OK"), "Pixel_4a");
        assert_eq!(strip_control_suffix("MY_BOOK"), "MY_BOOK");
        assert_eq!(strip_control_suffix("OK"), "OK");
    }

    #[test]
    fn test_remove_booted_duplicates_prefers_booted_device() {
        let booted = vec![booted("emulator-5554", "Medium_Phone_API_36.1")];
        let shutdown = vec![shutdown_avd("Medium_Phone_API_36.1"), shutdown_avd("Pixel_4a")];

        let result = remove_booted_duplicates(&booted, shutdown);
        assert_eq!(names(&result), vec!["Pixel_4a"]);
    }

    #[test]
    fn test_remove_booted_duplicates_handles_ok_suffix() {
        let booted = vec![booted("emulator-5554", "Pixel_4a\rOK")];
        let shutdown = vec![shutdown_avd("Pixel_4a")];

        assert!(remove_booted_duplicates(&booted, shutdown).is_empty());
    }

    #[test]
    fn test_remove_booted_duplicates_never_leaks_booted_name() {
        let booted = vec![
            booted("emulator-5554", "A\rOK"),
            booted("emulator-5556", "B"),
        ];
        let shutdown = vec![
            shutdown_avd("A"),
            shutdown_avd("B"),
            shutdown_avd("C"),
            EmulatorDevice::new("emulator-5558", "B\nOK", DeviceState::Shutdown),
        ];

        let result = remove_booted_duplicates(&booted, shutdown);
        for device in &result {
            let name = strip_control_suffix(&device.avd_name);
            assert!(booted
                .iter()
                .all(|b| strip_control_suffix(&b.avd_name) != name));
        }
        assert_eq!(names(&result), vec!["C"]);
    }

    #[test]
    fn test_filter_booted_devices_removes_unknown_model_style_name() {
        let devices = vec![
            booted("emulator-5554", "sdk_gphone64_arm64"),
            booted("emulator-5556", "Pixel_4a"),
        ];
        let avds = vec!["Pixel_4a".to_string(), "Medium_Phone_API_36.1".to_string()];

        let result = filter_booted_devices(devices, &avds);
        assert_eq!(names(&result), vec!["Pixel_4a"]);
    }

    #[test]
    fn test_filter_booted_devices_keeps_all_without_avd_list() {
        let devices = vec![booted("emulator-5554", "sdk_gphone64_arm64")];
        assert_eq!(filter_booted_devices(devices, &[]).len(), 1);
    }

    #[test]
    fn test_merge_shutdown_devices_first_wins() {
        let offline = EmulatorDevice::new("emulator-5556", "Pixel_4a", DeviceState::Shutdown);
        let merged = merge_shutdown_devices(
            vec![offline],
            vec![shutdown_avd("Pixel_4a"), shutdown_avd("Pixel_8")],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].serial, "emulator-5556");
        assert_eq!(merged[1].serial, "avd:Pixel_8");
    }

    #[test]
    fn test_reconcile_emulators() {
        let connected = vec![
            booted("emulator-5554", "Pixel_8_API_34"),
            EmulatorDevice::new("emulator-5556", "emulator-5556", DeviceState::Shutdown),
        ];
        let avds = vec!["Pixel_8_API_34".to_string(), "Small_Phone_API_35".to_string()];

        let snapshot = reconcile_emulators(connected, &avds);

        assert_eq!(snapshot.platform, Platform::Android);
        assert_eq!(snapshot.booted.len(), 1);
        assert_eq!(snapshot.booted[0].id(), "emulator-5554");

        let ShutdownDevices::Flat(shutdown) = &snapshot.shutdown else {
            panic!("Android shutdown devices must be flat");
        };
        let ids: Vec<&str> = shutdown.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["emulator-5556", "avd:Small_Phone_API_35"]);
        assert_eq!(shutdown[1].os_or_api_level().as_deref(), Some("API 35"));
    }
}
