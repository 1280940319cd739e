//! `adb devices -l` output parsing

use mdeck_core::types::{DeviceState, EmulatorDevice};

/// Serial prefix ADB uses for local emulator instances
pub const EMULATOR_SERIAL_PREFIX: &str = "emulator-";

/// Parse every device row of `adb devices -l`
///
/// Banner and daemon status lines are skipped. Rows need at least a serial
/// and a state token; `model:` and `sdk:` fields are optional and may appear
/// in any order.
pub fn parse_adb_devices(output: &str) -> Vec<EmulatorDevice> {
    output.lines().filter_map(parse_adb_device_line).collect()
}

/// Parse a single line, returning `None` for anything that is not a device row
pub fn parse_adb_device_line(line: &str) -> Option<EmulatorDevice> {
    let trimmed = line.trim();
    if !is_device_line(trimmed) {
        return None;
    }

    let mut parts = trimmed.split_whitespace();
    let serial = parts.next()?;
    let state_token = parts.next()?;

    let mut name = None;
    let mut api_level = None;
    for field in parts {
        if let Some(model) = field.strip_prefix("model:") {
            name = Some(model.replace('_', " "));
        } else if let Some(sdk) = field.strip_prefix("sdk:") {
            api_level = sdk.parse().ok();
        }
    }

    let mut device = EmulatorDevice::new(
        serial,
        name.unwrap_or_else(|| serial.to_string()),
        map_state(state_token),
    );
    device.api_level = api_level;
    Some(device)
}

fn is_device_line(line: &str) -> bool {
    !(line.is_empty()
        || line.starts_with('*')
        || line.starts_with("adb:")
        || line == "List of devices attached")
}

fn map_state(token: &str) -> DeviceState {
    if token == "device" {
        DeviceState::Booted
    } else {
        DeviceState::Shutdown
    }
}

/// Keep only local emulator instances (drops physical devices)
pub fn only_emulators(devices: Vec<EmulatorDevice>) -> Vec<EmulatorDevice> {
    devices
        .into_iter()
        .filter(|device| device.serial.starts_with(EMULATOR_SERIAL_PREFIX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "List of devices attached\n\
        * daemon not running; starting now at tcp:5037\n\
        * daemon started successfully\n\
        emulator-5554 device product:sdk_gphone64_arm64 model:sdk_gphone64_arm64 device:emu64a transport_id:1\n\
        emulator-5556 offline transport_id:2\n";

    #[test]
    fn test_parse_adb_devices_output() {
        let devices = parse_adb_devices(SAMPLE);

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].serial, "emulator-5554");
        assert_eq!(devices[0].state, DeviceState::Booted);
        assert_eq!(devices[0].name, "sdk gphone64 arm64");
        assert_eq!(devices[1].serial, "emulator-5556");
        assert_eq!(devices[1].state, DeviceState::Shutdown);
    }

    #[test]
    fn test_name_falls_back_to_serial() {
        let device = parse_adb_device_line("emulator-5556 offline transport_id:2").unwrap();
        assert_eq!(device.name, "emulator-5556");
        assert_eq!(device.avd_name, "emulator-5556");
    }

    #[test]
    fn test_fields_in_any_order() {
        let device =
            parse_adb_device_line("emulator-5554 device sdk:34 transport_id:3 model:Pixel_8")
                .unwrap();
        assert_eq!(device.name, "Pixel 8");
        assert_eq!(device.api_level, Some(34));
    }

    #[test]
    fn test_banner_and_error_lines_rejected() {
        for line in [
            "",
            "   ",
            "List of devices attached",
            "* daemon started successfully",
            "adb: failed to check server version",
            "lonely-serial",
        ] {
            assert!(parse_adb_device_line(line).is_none(), "accepted {:?}", line);
        }
    }

    #[test]
    fn test_count_matches_well_formed_rows() {
        let output = "List of devices attached\n\
            emulator-5554\tdevice\n\
            R58M123ABC\tdevice usb:1-1 model:SM_G973F\n\
            \n\
            emulator-5558\tunauthorized\n";
        assert_eq!(parse_adb_devices(output).len(), 3);
    }

    #[test]
    fn test_only_emulators() {
        let output = "emulator-5554 device\nR58M123ABC device model:Galaxy\n";
        let emulators = only_emulators(parse_adb_devices(output));
        assert_eq!(emulators.len(), 1);
        assert_eq!(emulators[0].serial, "emulator-5554");
    }
}
