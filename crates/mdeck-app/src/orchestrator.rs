//! Composition root shared by every front end
//!
//! [`Orchestrator`] owns one instance of each service and the shared
//! running-app cell. A successful install-and-launch writes that cell; the
//! console engine watches it and restarts logging.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use mdeck_core::prelude::*;
use mdeck_core::{AppBundle, Device, DeviceSnapshot, Platform, RunningApp};
use mdeck_daemon::{LaunchOptions, PlatformInstaller, ProcessRunner, ToolAvailability, ToolLocator};

use crate::bundle::AppBundleInspector;
use crate::catalog::{DeviceCatalog, EmulatorCatalog, SimulatorCatalog};
use crate::config::Settings;
use crate::console::{spawn_console, ConsoleHandle, LogStreams};
use crate::lifecycle::AppLifecycleService;

/// Both platform snapshots from one refresh
///
/// Each side fails independently so a missing toolchain on one platform
/// still lets the other list its devices.
#[derive(Debug)]
pub struct DeviceListing {
    pub ios: Result<DeviceSnapshot>,
    pub android: Result<DeviceSnapshot>,
}

impl DeviceListing {
    /// Look a device up by id across whichever snapshots succeeded
    pub fn find(&self, id: &str) -> Option<&Device> {
        [&self.ios, &self.android]
            .into_iter()
            .filter_map(|snapshot| snapshot.as_ref().ok())
            .find_map(|snapshot| snapshot.find(id))
    }
}

pub struct Orchestrator<R> {
    runner: Arc<R>,
    settings: Settings,
    locator: ToolLocator,
    simulators: SimulatorCatalog<R>,
    emulators: EmulatorCatalog<R>,
    lifecycle: AppLifecycleService<R>,
    inspector: Arc<AppBundleInspector<R>>,
    installer: PlatformInstaller<R>,
    running_app: watch::Sender<Option<RunningApp>>,
}

impl<R: ProcessRunner + Sync + 'static> Orchestrator<R> {
    pub fn new(runner: Arc<R>, locator: ToolLocator, settings: Settings) -> Self {
        let (running_app, _) = watch::channel(None);
        Self {
            simulators: SimulatorCatalog::new(Arc::clone(&runner)),
            emulators: EmulatorCatalog::new(Arc::clone(&runner)),
            lifecycle: AppLifecycleService::new(Arc::clone(&runner)),
            inspector: Arc::new(AppBundleInspector::new(Arc::clone(&runner))),
            installer: PlatformInstaller::new(Arc::clone(&runner)),
            runner,
            settings,
            locator,
            running_app,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn installer(&self) -> &PlatformInstaller<R> {
        &self.installer
    }

    // ─────────────────────────────────────────────────────────
    // Devices
    // ─────────────────────────────────────────────────────────

    pub async fn snapshot(&self, platform: Platform) -> Result<DeviceSnapshot> {
        match platform {
            Platform::IOS => self.simulators.snapshot().await,
            Platform::Android => self.emulators.snapshot().await,
        }
    }

    /// Refresh both platforms concurrently
    pub async fn list_devices(&self) -> DeviceListing {
        let (ios, android) = tokio::join!(self.simulators.snapshot(), self.emulators.snapshot());
        if let Err(e) = &ios {
            debug!("Simulator refresh failed: {}", e);
        }
        if let Err(e) = &android {
            debug!("Emulator refresh failed: {}", e);
        }
        DeviceListing { ios, android }
    }

    pub async fn find_device(&self, id: &str) -> Result<Device> {
        self.list_devices()
            .await
            .find(id)
            .cloned()
            .ok_or_else(|| Error::invalid_arguments(format!("Unknown device: {}", id)))
    }

    /// Boot the device and return the refreshed snapshot of its platform
    pub async fn boot(&self, id: &str) -> Result<DeviceSnapshot> {
        let device = self.find_device(id).await?;
        match device.platform() {
            Platform::IOS => self.simulators.boot(&device)?,
            Platform::Android => self.emulators.boot(&device)?,
        }
        self.snapshot(device.platform()).await
    }

    /// Shut the device down and return the refreshed snapshot of its platform
    pub async fn shutdown(&self, id: &str) -> Result<DeviceSnapshot> {
        let device = self.find_device(id).await?;
        match device.platform() {
            Platform::IOS => self.simulators.shutdown(&device).await?,
            Platform::Android => self.emulators.shutdown(&device).await?,
        }
        self.snapshot(device.platform()).await
    }

    // ─────────────────────────────────────────────────────────
    // Apps
    // ─────────────────────────────────────────────────────────

    pub async fn inspect(&self, path: PathBuf) -> Result<AppBundle> {
        let inspector = Arc::clone(&self.inspector);
        tokio::task::spawn_blocking(move || inspector.inspect(&path))
            .await
            .map_err(|e| Error::process(format!("Bundle inspection task failed: {}", e)))?
    }

    /// Install and launch, then publish the result as the running app
    ///
    /// For iOS `device_id` picks the simulator; without it the first booted
    /// simulator is used. Android always targets the first booted emulator.
    pub async fn install_and_launch(
        &self,
        bundle: &AppBundle,
        device_id: Option<&str>,
        options: &LaunchOptions,
    ) -> Result<RunningApp> {
        options.validate()?;
        let device = match bundle.platform {
            Platform::IOS => self.target_simulator(device_id).await?,
            Platform::Android => None,
        };

        let app = self
            .lifecycle
            .install_and_launch(bundle, device.as_ref(), options)
            .await?;
        info!(
            "Running {} ({}) on {}",
            app.display_name, app.bundle_id, app.device_id
        );
        self.running_app.send_replace(Some(app.clone()));
        Ok(app)
    }

    async fn target_simulator(&self, device_id: Option<&str>) -> Result<Option<Device>> {
        let snapshot = self.simulators.snapshot().await?;
        let device = match device_id {
            Some(id) => Some(
                snapshot
                    .find(id)
                    .cloned()
                    .ok_or_else(|| Error::invalid_arguments(format!("Unknown simulator: {}", id)))?,
            ),
            None => snapshot.booted.first().cloned(),
        };
        Ok(device)
    }

    pub fn running_app(&self) -> Option<RunningApp> {
        self.running_app.borrow().clone()
    }

    pub fn clear_running_app(&self) {
        self.running_app.send_replace(None);
    }

    // ─────────────────────────────────────────────────────────
    // Environment & Console
    // ─────────────────────────────────────────────────────────

    pub async fn check_environment(&self) -> ToolAvailability {
        ToolAvailability::check(self.runner.as_ref(), &self.locator).await
    }

    /// Start a console engine following the running app
    pub fn spawn_console(&self) -> ConsoleHandle {
        spawn_console(
            LogStreams::new(Arc::clone(&self.runner)),
            self.running_app.subscribe(),
            &self.settings.logging,
        )
    }
}
