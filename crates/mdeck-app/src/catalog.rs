//! Device catalogs: discovery, boot and shutdown per platform
//!
//! Catalogs never cache. Every [`DeviceCatalog::snapshot`] call queries the
//! platform tool again, so callers refresh after any boot or shutdown.

use std::sync::Arc;

use mdeck_core::prelude::*;
use mdeck_core::{Device, DeviceSnapshot, EmulatorDevice, Platform};
use mdeck_daemon::commands::{adb, emulator, simctl};
use mdeck_daemon::{
    classify_simulators, only_emulators, parse_adb_devices, parse_avd_list,
    parse_running_avd_name, parse_simctl_devices, reconcile_emulators, ProcessRunner,
};

/// Discovery and power control for one platform's virtual devices
#[trait_variant::make(DeviceCatalog: Send)]
pub trait LocalDeviceCatalog {
    fn platform(&self) -> Platform;

    /// Query the platform tool for the current device list
    async fn snapshot(&self) -> Result<DeviceSnapshot>;

    /// Start booting `device`; returns once the boot process has spawned
    fn boot(&self, device: &Device) -> Result<()>;

    /// Shut `device` down and wait for the tool to finish
    async fn shutdown(&self, device: &Device) -> Result<()>;
}

fn wrong_platform(expected: Platform, device: &Device) -> Error {
    Error::invalid_arguments(format!(
        "{} is not an {} device",
        device.display_name(),
        expected
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// iOS
// ─────────────────────────────────────────────────────────────────────────────

/// iOS simulators via `xcrun simctl`
pub struct SimulatorCatalog<R> {
    runner: Arc<R>,
}

impl<R> SimulatorCatalog<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }
}

impl<R: ProcessRunner + Sync + 'static> DeviceCatalog for SimulatorCatalog<R> {
    fn platform(&self) -> Platform {
        Platform::IOS
    }

    async fn snapshot(&self) -> Result<DeviceSnapshot> {
        let output = self.runner.run(&simctl::list_devices()).await?;
        let simulators = parse_simctl_devices(&output)?;
        let snapshot = classify_simulators(simulators);
        debug!(
            "Simulator snapshot: {} booted, {} shutdown",
            snapshot.booted.len(),
            snapshot.shutdown.len()
        );
        Ok(snapshot)
    }

    fn boot(&self, device: &Device) -> Result<()> {
        let simulator = device
            .as_simulator()
            .ok_or_else(|| wrong_platform(Platform::IOS, device))?;
        info!("Booting simulator {} ({})", simulator.name, simulator.udid);
        self.runner.spawn_detached(&simctl::boot(&simulator.udid))
    }

    async fn shutdown(&self, device: &Device) -> Result<()> {
        let simulator = device
            .as_simulator()
            .ok_or_else(|| wrong_platform(Platform::IOS, device))?;
        info!("Shutting down simulator {} ({})", simulator.name, simulator.udid);
        self.runner.run(&simctl::shutdown(&simulator.udid)).await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Android
// ─────────────────────────────────────────────────────────────────────────────

/// Android emulators via `adb` and `emulator`
pub struct EmulatorCatalog<R> {
    runner: Arc<R>,
}

impl<R: ProcessRunner + Sync + 'static> EmulatorCatalog<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }

    /// Running emulators known to ADB, with their AVD names resolved
    async fn connected_emulators(&self) -> Result<Vec<EmulatorDevice>> {
        self.runner.run(&adb::start_server()).await?;
        let output = self.runner.run(&adb::devices()).await?;
        let emulators = only_emulators(parse_adb_devices(&output));

        let mut resolved = Vec::with_capacity(emulators.len());
        for device in emulators {
            resolved.push(self.resolve_avd_name(device).await);
        }
        Ok(resolved)
    }

    /// Ask a booted emulator for its AVD name, keeping the raw name on failure
    async fn resolve_avd_name(&self, device: EmulatorDevice) -> EmulatorDevice {
        if !device.state.is_booted() {
            return device;
        }
        match self.runner.run(&adb::emu_avd_name(&device.serial)).await {
            Ok(output) => match parse_running_avd_name(&output) {
                Some(avd_name) => device.with_avd_name(avd_name),
                None => {
                    debug!("Empty AVD name reply from {}", device.serial);
                    device
                }
            },
            Err(e) => {
                debug!("Could not resolve AVD name for {}: {}", device.serial, e);
                device
            }
        }
    }

    /// AVD images; a missing or failing `emulator` tool yields an empty list
    async fn avd_names(&self) -> Vec<String> {
        match self.runner.run(&emulator::list_avds()).await {
            Ok(output) => parse_avd_list(&output),
            Err(e) => {
                warn!("Could not list AVDs: {}", e);
                Vec::new()
            }
        }
    }
}

impl<R: ProcessRunner + Sync + 'static> DeviceCatalog for EmulatorCatalog<R> {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    async fn snapshot(&self) -> Result<DeviceSnapshot> {
        let connected = self.connected_emulators().await?;
        let avd_names = self.avd_names().await;
        let snapshot = reconcile_emulators(connected, &avd_names);
        debug!(
            "Emulator snapshot: {} booted, {} shutdown",
            snapshot.booted.len(),
            snapshot.shutdown.len()
        );
        Ok(snapshot)
    }

    fn boot(&self, device: &Device) -> Result<()> {
        let emulator = device
            .as_emulator()
            .ok_or_else(|| wrong_platform(Platform::Android, device))?;
        info!("Booting AVD {}", emulator.avd_name);
        self.runner.spawn_detached(&emulator::boot(&emulator.avd_name))
    }

    async fn shutdown(&self, device: &Device) -> Result<()> {
        let emulator = device
            .as_emulator()
            .ok_or_else(|| wrong_platform(Platform::Android, device))?;
        if !emulator.has_adb_serial() {
            return Err(Error::invalid_arguments(format!(
                "{} is not running",
                emulator.display_name()
            )));
        }
        info!("Shutting down emulator {}", emulator.serial);
        self.runner.run(&adb::emu_kill(&emulator.serial)).await?;
        Ok(())
    }
}
