//! iOS platform download via `xcodebuild -downloadPlatform iOS`
//!
//! Only one download runs at a time. Starting a new one stops the previous
//! process first.

use std::sync::Arc;

use tokio::sync::Mutex;

use mdeck_core::prelude::*;

use crate::commands::platform;
use crate::process::{LineStream, ProcessRunner, StreamControl};

/// Streams the output of the platform installer
pub struct PlatformInstaller<R> {
    runner: Arc<R>,
    active: Mutex<Option<StreamControl>>,
}

impl<R: ProcessRunner + Sync + 'static> PlatformInstaller<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self {
            runner,
            active: Mutex::new(None),
        }
    }

    /// Start downloading the iOS platform, returning its progress output
    pub async fn start_install(&self) -> LineStream {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            debug!("Stopping previous platform install");
            previous.stop().await;
        }

        let invocation = platform::download_ios_platform();
        info!("Starting platform install: {}", invocation);
        let stream = self.runner.stream(&invocation);
        *active = Some(stream.control());
        stream
    }

    /// Stop the running install, if any
    pub async fn cancel_install(&self) {
        let previous = self.active.lock().await.take();
        if let Some(control) = previous {
            info!("Cancelling platform install");
            control.stop().await;
        }
    }

    pub async fn is_installing(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|control| !control.has_exited())
    }

    /// Open the App Store page for Xcode
    pub fn open_vendor_install_page(&self) -> Result<()> {
        self.runner
            .spawn_detached(&platform::open_url(platform::XCODE_STORE_URL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Call, FakeRunner, ScriptedStream};

    #[tokio::test]
    async fn test_start_install_streams_progress() {
        let fake = Arc::new(FakeRunner::new());
        fake.script_stream(
            platform::download_ios_platform(),
            ScriptedStream::lines(["Downloading iOS 18.0", "Done"]),
        );
        let installer = PlatformInstaller::new(Arc::clone(&fake));

        let mut stream = installer.start_install().await;
        assert_eq!(stream.next_line().await.unwrap().unwrap(), "Downloading iOS 18.0");
        assert_eq!(stream.next_line().await.unwrap().unwrap(), "Done");
        assert!(stream.next_line().await.is_none());
        assert!(!installer.is_installing().await);
    }

    #[tokio::test]
    async fn test_second_install_stops_first() {
        let fake = Arc::new(FakeRunner::new());
        let installer = PlatformInstaller::new(Arc::clone(&fake));

        let _first = installer.start_install().await;
        let _second = installer.start_install().await;

        let download = platform::download_ios_platform();
        assert_eq!(
            fake.calls(),
            vec![
                Call::Stream(download.clone()),
                Call::Kill(download.clone()),
                Call::Stream(download),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_install_is_idempotent() {
        let fake = Arc::new(FakeRunner::new());
        let installer = PlatformInstaller::new(Arc::clone(&fake));

        installer.cancel_install().await;
        let mut stream = installer.start_install().await;
        assert!(installer.is_installing().await);

        installer.cancel_install().await;
        installer.cancel_install().await;

        assert_eq!(fake.kills().len(), 1);
        assert!(stream.next_line().await.is_none());
    }

    #[tokio::test]
    async fn test_open_vendor_install_page() {
        let fake = Arc::new(FakeRunner::new());
        let installer = PlatformInstaller::new(Arc::clone(&fake));

        installer.open_vendor_install_page().unwrap();
        assert_eq!(
            fake.calls(),
            vec![Call::Detached(platform::open_url(platform::XCODE_STORE_URL))]
        );
    }
}
