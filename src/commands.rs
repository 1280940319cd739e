//! Subcommand implementations
//!
//! Everything here is generic over the process runner so the same code runs
//! against a fake in tests.

use std::future::Future;
use std::path::PathBuf;

use mdeck_app::{ConsoleHandle, ConsoleSnapshot, Message, Orchestrator};
use mdeck_core::prelude::*;
use mdeck_core::{AppBundle, DeviceSnapshot, Platform, RunningApp};
use mdeck_daemon::ProcessRunner;

use crate::cli::{Command, RunArgs};
use crate::headless::{HeadlessEvent, Reporter};

/// Run one subcommand; `shutdown` ends long-running commands early
///
/// `config init` is handled before an orchestrator exists and is ignored here.
pub async fn execute<R, S>(
    orchestrator: &Orchestrator<R>,
    command: Command,
    reporter: &Reporter,
    shutdown: S,
) -> Result<()>
where
    R: ProcessRunner + Sync + 'static,
    S: Future<Output = ()>,
{
    match command {
        Command::Devices { platform } => match platform {
            Some(platform) => {
                let snapshot = orchestrator.snapshot(platform.into()).await?;
                report_snapshot(reporter, &snapshot);
                Ok(())
            }
            None => {
                let listing = orchestrator.list_devices().await;
                report_listing(reporter, Platform::IOS, &listing.ios);
                report_listing(reporter, Platform::Android, &listing.android);
                Ok(())
            }
        },

        Command::Boot { id } => {
            let snapshot = orchestrator.boot(&id).await?;
            reporter.emit(&HeadlessEvent::boot_requested(&id));
            report_snapshot(reporter, &snapshot);
            Ok(())
        }

        Command::Shutdown { id } => {
            let snapshot = orchestrator.shutdown(&id).await?;
            reporter.emit(&HeadlessEvent::shutdown_completed(&id));
            report_snapshot(reporter, &snapshot);
            Ok(())
        }

        Command::Inspect { path } => {
            inspect_bundle(orchestrator, path, reporter).await?;
            Ok(())
        }

        Command::Run(args) => run_app(orchestrator, args, reporter, shutdown).await,

        Command::Doctor => {
            let availability = orchestrator.check_environment().await;
            reporter.emit(&HeadlessEvent::tool_status(&availability));
            Ok(())
        }

        Command::InstallPlatform { open_store: true } => {
            orchestrator.installer().open_vendor_install_page()
        }

        Command::InstallPlatform { open_store: false } => {
            install_platform(orchestrator, reporter, shutdown).await
        }

        Command::Config { .. } => Ok(()),
    }
}

/// Inspect and report a bundle
///
/// A recoverable failure (unsupported extension, unreadable metadata) is
/// reported as a warning and yields `None`.
async fn inspect_bundle<R>(
    orchestrator: &Orchestrator<R>,
    path: PathBuf,
    reporter: &Reporter,
) -> Result<Option<AppBundle>>
where
    R: ProcessRunner + Sync + 'static,
{
    match orchestrator.inspect(path).await {
        Ok(bundle) => {
            reporter.emit(&HeadlessEvent::bundle_inspected(&bundle));
            Ok(Some(bundle))
        }
        Err(e) if e.is_recoverable() => {
            warn!("Skipping bundle: {}", e);
            reporter.emit(&HeadlessEvent::warning(&e));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn report_snapshot(reporter: &Reporter, snapshot: &DeviceSnapshot) {
    for device in snapshot.devices() {
        reporter.emit(&HeadlessEvent::device_detected(device));
    }
}

fn report_listing(reporter: &Reporter, platform: Platform, snapshot: &Result<DeviceSnapshot>) {
    match snapshot {
        Ok(snapshot) => report_snapshot(reporter, snapshot),
        Err(e) => reporter.emit(&HeadlessEvent::platform_unavailable(platform, e)),
    }
}

// ─────────────────────────────────────────────────────────
// run
// ─────────────────────────────────────────────────────────

async fn run_app<R, S>(
    orchestrator: &Orchestrator<R>,
    args: RunArgs,
    reporter: &Reporter,
    shutdown: S,
) -> Result<()>
where
    R: ProcessRunner + Sync + 'static,
    S: Future<Output = ()>,
{
    let Some(bundle) = inspect_bundle(orchestrator, args.path.clone(), reporter).await? else {
        return Ok(());
    };

    let options = args.launch_options(orchestrator.settings().launch_options());
    let console = orchestrator.spawn_console();
    let app = match orchestrator
        .install_and_launch(&bundle, args.device.as_deref(), &options)
        .await
    {
        Ok(app) => app,
        Err(e) => {
            console.shutdown().await;
            return Err(e);
        }
    };
    reporter.emit(&HeadlessEvent::app_started(&app));

    if let Some(query) = &args.search {
        console.send(Message::SearchInputChanged(query.clone()))?;
    }

    let result = follow_logs(&console, &app, reporter, shutdown).await;
    console.shutdown().await;
    result
}

/// Print console lines for `app` until its stream ends or `shutdown` fires
async fn follow_logs<S: Future<Output = ()>>(
    console: &ConsoleHandle,
    app: &RunningApp,
    reporter: &Reporter,
    shutdown: S,
) -> Result<()> {
    let mut snapshots = console.snapshots();
    let mut printer = LinePrinter::default();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, stopping log stream");
                return Ok(());
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Err(Error::ChannelClosed);
                }
                let snapshot = snapshots.borrow_and_update().clone();
                // The engine may not have seen the launch yet
                if snapshot.running_app.as_ref() != Some(app) {
                    continue;
                }
                printer.print(reporter, &snapshot);
                if !snapshot.is_logging && !snapshot.is_paused {
                    reporter.emit(&HeadlessEvent::logging_stopped());
                    return Ok(());
                }
            }
        }
    }
}

/// Tracks what has already been printed across snapshots
#[derive(Debug, Default)]
pub struct LinePrinter {
    seen: u64,
    query: String,
}

impl LinePrinter {
    pub fn print(&mut self, reporter: &Reporter, snapshot: &ConsoleSnapshot) {
        if snapshot.search_query != self.query {
            self.query = snapshot.search_query.clone();
            if !self.query.is_empty() {
                reporter.emit(&HeadlessEvent::search_updated(
                    &self.query,
                    snapshot.matches.len(),
                ));
            }
        }

        let new = snapshot.lines_since(self.seen);
        let first_index = snapshot.lines.len() - new.len();
        for (offset, event) in new.iter().enumerate() {
            let matched = snapshot.matches.binary_search(&(first_index + offset)).is_ok();
            reporter.emit(&HeadlessEvent::log(event, matched));
        }
        self.seen = snapshot.total_received;
    }
}

// ─────────────────────────────────────────────────────────
// install-platform
// ─────────────────────────────────────────────────────────

async fn install_platform<R, S>(
    orchestrator: &Orchestrator<R>,
    reporter: &Reporter,
    shutdown: S,
) -> Result<()>
where
    R: ProcessRunner + Sync + 'static,
    S: Future<Output = ()>,
{
    let installer = orchestrator.installer();
    let mut stream = installer.start_install().await;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                installer.cancel_install().await;
                return Ok(());
            }
            line = stream.next_line() => match line {
                Some(Ok(line)) => reporter.emit(&HeadlessEvent::install_progress(&line)),
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use mdeck_app::Settings;
    use mdeck_daemon::commands::{inspect, platform, simctl};
    use mdeck_daemon::test_utils::{Call, FakeRunner, Reply, ScriptedStream};
    use mdeck_daemon::{LocatorConfig, ToolLocator};

    fn orchestrator(runner: &Arc<FakeRunner>) -> Orchestrator<FakeRunner> {
        Orchestrator::new(
            Arc::clone(runner),
            ToolLocator::new(LocatorConfig::default()),
            Settings::default(),
        )
    }

    #[tokio::test]
    async fn test_single_platform_listing_propagates_failure() {
        let runner = Arc::new(FakeRunner::new());
        runner.reply_exit(simctl::list_devices(), 72, "xcrun: error: unable to find utility");
        let orchestrator = orchestrator(&runner);

        let result = execute(
            &orchestrator,
            Command::Devices {
                platform: Some(crate::cli::PlatformArg::Ios),
            },
            &Reporter::new(true),
            std::future::pending(),
        )
        .await;

        assert!(matches!(result, Err(Error::NonZeroExit { code: 72, .. })));
    }

    #[tokio::test]
    async fn test_install_platform_runs_to_completion() {
        let runner = Arc::new(FakeRunner::new());
        runner.script_stream(
            platform::download_ios_platform(),
            ScriptedStream::lines(["Downloading", "Done"]),
        );
        let orchestrator = orchestrator(&runner);

        execute(
            &orchestrator,
            Command::InstallPlatform { open_store: false },
            &Reporter::new(true),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(
            runner.stream_starts(),
            vec![platform::download_ios_platform()]
        );
    }

    #[tokio::test]
    async fn test_install_platform_cancelled_by_shutdown() {
        let runner = Arc::new(FakeRunner::new());
        let orchestrator = orchestrator(&runner);

        execute(
            &orchestrator,
            Command::InstallPlatform { open_store: false },
            &Reporter::new(true),
            async {},
        )
        .await
        .unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                Call::Stream(platform::download_ios_platform()),
                Call::Kill(platform::download_ios_platform()),
            ]
        );
    }

    #[tokio::test]
    async fn test_inspect_unsupported_bundle_is_a_warning() {
        let runner = Arc::new(FakeRunner::new());
        let orchestrator = orchestrator(&runner);

        let result = execute(
            &orchestrator,
            Command::Inspect {
                path: PathBuf::from("/tmp/Demo.zip"),
            },
            &Reporter::new(true),
            std::future::pending(),
        )
        .await;

        assert!(result.is_ok());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_inspect_without_android_tools_still_fails() {
        let temp = tempfile::tempdir().unwrap();
        let apk = temp.path().join("demo.apk");
        std::fs::write(&apk, b"PK").unwrap();
        let runner = Arc::new(FakeRunner::new());
        runner
            .reply(inspect::apk_application_id(&apk), Reply::NotFound)
            .reply(inspect::aapt_badging(&apk), Reply::NotFound);
        let orchestrator = orchestrator(&runner);

        let result = execute(
            &orchestrator,
            Command::Inspect { path: apk },
            &Reporter::new(true),
            std::future::pending(),
        )
        .await;

        assert!(matches!(result, Err(Error::ToolNotFound { .. })));
    }

    #[test]
    fn test_line_printer_only_prints_new_lines() {
        use mdeck_app::ConsoleState;
        use mdeck_core::LogEvent;

        let mut state = ConsoleState::new(10);
        let mut printer = LinePrinter::default();
        let reporter = Reporter::new(true);

        state.push_line(LogEvent::output(Platform::IOS, "one"));
        printer.print(&reporter, &state.snapshot());
        assert_eq!(printer.seen, 1);

        state.push_line(LogEvent::output(Platform::IOS, "two"));
        state.push_line(LogEvent::output(Platform::IOS, "three"));
        printer.print(&reporter, &state.snapshot());
        assert_eq!(printer.seen, 3);
    }
}
