//! iOS simulator discovery output parsing
//!
//! Decodes `xcrun simctl list devices --json` and classifies the result into
//! a [`DeviceSnapshot`].

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Deserialize;

use mdeck_core::prelude::*;
use mdeck_core::types::{
    Device, DeviceGroup, DeviceSnapshot, DeviceState, Platform, ShutdownDevices, SimulatorDevice,
};

const RUNTIME_PREFIX: &str = "com.apple.CoreSimulator.SimRuntime.";

/// JSON output from `xcrun simctl list devices --json`
#[derive(Debug, Deserialize)]
struct SimctlOutput {
    devices: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimctlDevice {
    udid: String,
    name: String,
    state: String,
    is_available: Option<bool>,
}

/// Decode the device list.
///
/// Invalid JSON overall is an error. Individual records that are malformed or
/// carry a state other than `Booted`/`Shutdown` are skipped.
pub fn parse_simctl_devices(json: &str) -> Result<Vec<SimulatorDevice>> {
    let parsed: SimctlOutput = serde_json::from_str(json)
        .map_err(|e| Error::protocol(format!("Failed to parse simctl output: {}", e)))?;

    let mut simulators = Vec::new();

    for (runtime_key, records) in parsed.devices {
        let os = parse_runtime_name(&runtime_key);

        let serde_json::Value::Array(records) = records else {
            debug!("Skipping non-array runtime entry: {}", runtime_key);
            continue;
        };

        for record in records {
            let device = match SimctlDevice::deserialize(&record) {
                Ok(device) => device,
                Err(e) => {
                    debug!("Skipping malformed simctl record under {}: {}", runtime_key, e);
                    continue;
                }
            };

            let Some(state) = DeviceState::from_simctl(&device.state) else {
                trace!("Skipping {} in state {}", device.udid, device.state);
                continue;
            };

            simulators.push(SimulatorDevice {
                udid: device.udid,
                name: device.name,
                os: os.clone(),
                state,
                is_available: device.is_available.unwrap_or(false),
            });
        }
    }

    Ok(simulators)
}

/// Parse runtime identifier to friendly name
///
/// "com.apple.CoreSimulator.SimRuntime.iOS-17-2" -> "iOS 17.2"
pub fn parse_runtime_name(identifier: &str) -> String {
    let suffix = identifier
        .strip_prefix(RUNTIME_PREFIX)
        .unwrap_or(identifier);

    match suffix.split_once('-') {
        Some((os_name, version)) => format!("{} {}", os_name, version.replace('-', ".")),
        None => suffix.to_string(),
    }
}

/// Order OS labels by family, then numerically by version
///
/// "iOS 10.0" sorts after "iOS 9.3".
pub fn compare_os(a: &str, b: &str) -> Ordering {
    let (family_a, version_a) = os_sort_key(a);
    let (family_b, version_b) = os_sort_key(b);
    family_a
        .cmp(family_b)
        .then_with(|| version_a.cmp(&version_b))
        .then_with(|| a.cmp(b))
}

fn os_sort_key(os: &str) -> (&str, Vec<u32>) {
    let (family, version) = os.split_once(' ').unwrap_or((os, ""));
    let version = version
        .split('.')
        .filter_map(|part| part.trim().parse().ok())
        .collect();
    (family, version)
}

/// Split simulators into booted and OS-grouped shutdown devices.
///
/// Devices are ordered by OS descending then name descending; groups keep
/// that OS order.
pub fn classify_simulators(mut simulators: Vec<SimulatorDevice>) -> DeviceSnapshot {
    simulators.sort_by(|a, b| compare_os(&b.os, &a.os).then_with(|| b.name.cmp(&a.name)));

    let mut booted = Vec::new();
    let mut groups: Vec<DeviceGroup> = Vec::new();

    for simulator in simulators {
        if simulator.state.is_booted() {
            booted.push(Device::Simulator(simulator));
            continue;
        }

        match groups.iter_mut().find(|group| group.os == simulator.os) {
            Some(group) => group.devices.push(Device::Simulator(simulator)),
            None => groups.push(DeviceGroup {
                os: simulator.os.clone(),
                devices: vec![Device::Simulator(simulator)],
            }),
        }
    }

    DeviceSnapshot {
        platform: Platform::IOS,
        booted,
        shutdown: ShutdownDevices::Grouped(groups),
    }
}
