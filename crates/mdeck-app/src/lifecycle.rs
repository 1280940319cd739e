//! Install and launch an app bundle on a device
//!
//! [`AppLifecycleService::install_and_launch`] is the only producer of
//! [`RunningApp`] values.

use std::sync::Arc;

use mdeck_core::prelude::*;
use mdeck_core::{AppBundle, Device, Platform, RunningApp};
use mdeck_daemon::commands::{adb, simctl};
use mdeck_daemon::{LaunchOptions, ProcessRunner};

use crate::catalog::{DeviceCatalog, EmulatorCatalog};

pub struct AppLifecycleService<R> {
    runner: Arc<R>,
    emulators: EmulatorCatalog<R>,
}

impl<R: ProcessRunner + Sync + 'static> AppLifecycleService<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self {
            emulators: EmulatorCatalog::new(Arc::clone(&runner)),
            runner,
        }
    }

    /// Install `bundle` and launch it
    ///
    /// iOS installs onto `device`, which must be a simulator. Android
    /// ignores `device` and targets the first booted emulator.
    pub async fn install_and_launch(
        &self,
        bundle: &AppBundle,
        device: Option<&Device>,
        options: &LaunchOptions,
    ) -> Result<RunningApp> {
        match bundle.platform {
            Platform::IOS => {
                let udid = device
                    .and_then(Device::as_simulator)
                    .map(|simulator| simulator.udid.as_str())
                    .ok_or_else(|| Error::invalid_arguments("No simulator selected"))?;
                self.install_ios(bundle, udid, options).await
            }
            Platform::Android => self.install_android(bundle).await,
        }
    }

    async fn install_ios(
        &self,
        bundle: &AppBundle,
        udid: &str,
        options: &LaunchOptions,
    ) -> Result<RunningApp> {
        // Built first so invalid options fail before anything is spawned
        let launch = simctl::launch(udid, &bundle.id, options)?;

        info!("Installing {} on simulator {}", bundle.id, udid);
        self.runner.run(&simctl::boot_status(udid)).await?;
        self.runner.run(&simctl::install(udid, &bundle.path)).await?;

        info!("Launching {} on simulator {}", bundle.id, udid);
        self.runner.run(&simctl::boot_status(udid)).await?;
        self.runner.run(&launch).await?;

        Ok(RunningApp {
            platform: Platform::IOS,
            bundle_id: bundle.id.clone(),
            process_name: bundle.executable_name.clone(),
            display_name: bundle.display_name.clone(),
            device_id: udid.to_string(),
        })
    }

    async fn install_android(&self, bundle: &AppBundle) -> Result<RunningApp> {
        let snapshot = self.emulators.snapshot().await?;
        let serial = snapshot
            .booted
            .iter()
            .filter_map(Device::as_emulator)
            .map(|emulator| emulator.serial.clone())
            .next()
            .ok_or(Error::NoBootedDevice)?;

        info!("Installing {} on {}", bundle.id, serial);
        self.runner.run(&adb::install(&serial, &bundle.path)).await?;

        info!("Launching {} on {}", bundle.id, serial);
        self.runner.run(&adb::launch(&serial, &bundle.id)).await?;

        Ok(RunningApp {
            platform: Platform::Android,
            bundle_id: bundle.id.clone(),
            process_name: bundle.id.clone(),
            display_name: bundle.display_name.clone(),
            device_id: serial,
        })
    }
}
