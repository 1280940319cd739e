//! External process execution
//!
//! [`ProcessRunner`] is the seam every higher layer talks to. It offers three
//! modes: run-to-completion (async and blocking), detached spawn, and
//! long-lived streaming of stdout lines through a [`LineStream`].
//!
//! A streaming child is owned by a background pump task. The pump holds the
//! receiving half of a kill channel; [`StreamControl::stop`] (or dropping the
//! [`LineStream`]) sends the kill, and the pump kills and reaps the child
//! before it releases the stream. `stop()` only returns once that has
//! happened, and a stopped stream never yields another item.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, watch};

use mdeck_core::prelude::*;

use crate::commands::{Invocation, Tool};
use crate::locate::ToolLocator;

const READ_CHUNK: usize = 8 * 1024;
/// Stream stderr is only needed to describe a failed exit
const STDERR_TAIL_BYTES: usize = 4 * 1024;

/// Executes platform tools
#[trait_variant::make(ProcessRunner: Send)]
pub trait LocalProcessRunner {
    /// Run to completion without blocking the runtime; returns stdout on exit 0
    async fn run(&self, invocation: &Invocation) -> Result<String>;

    /// Run to completion on the calling thread; returns stdout on exit 0
    fn run_sync(&self, invocation: &Invocation) -> Result<String>;

    /// Spawn and return once the process has started
    fn spawn_detached(&self, invocation: &Invocation) -> Result<()>;

    /// Spawn a long-lived process and stream its stdout line by line
    ///
    /// Spawn failures are delivered as the stream's first (and only) item.
    fn stream(&self, invocation: &Invocation) -> LineStream;
}

// ─────────────────────────────────────────────────────────────────────────────
// SystemRunner
// ─────────────────────────────────────────────────────────────────────────────

/// [`ProcessRunner`] backed by real child processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    locator: ToolLocator,
}

impl SystemRunner {
    pub fn new(locator: ToolLocator) -> Self {
        Self { locator }
    }

    pub fn locator(&self) -> &ToolLocator {
        &self.locator
    }
}

impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<String> {
        let program = self.locator.resolve(invocation.tool)?;
        debug!("Running: {}", invocation);
        run_command(&program, invocation.tool, &invocation.args).await
    }

    fn run_sync(&self, invocation: &Invocation) -> Result<String> {
        let program = self.locator.resolve(invocation.tool)?;
        debug!("Running (blocking): {}", invocation);
        let output = std::process::Command::new(&program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(invocation.tool, e))?;
        collect_output(output)
    }

    fn spawn_detached(&self, invocation: &Invocation) -> Result<()> {
        let program = self.locator.resolve(invocation.tool)?;
        info!("Spawning detached: {}", invocation);

        let mut child = Command::new(&program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_error(invocation.tool, e))?;

        // Reap in the background so the child never lingers as a zombie
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        Ok(())
    }

    fn stream(&self, invocation: &Invocation) -> LineStream {
        let program = match self.locator.resolve(invocation.tool) {
            Ok(program) => program,
            Err(e) => return LineStream::failed(e),
        };
        info!("Streaming: {}", invocation);
        stream_command(&program, invocation.tool, &invocation.args)
    }
}

async fn run_command(program: &Path, tool: Tool, args: &[String]) -> Result<String> {
    // kill_on_drop: a cancelled caller tears the child down with it
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| spawn_error(tool, e))?;
    collect_output(output)
}

fn collect_output(output: std::process::Output) -> Result<String> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        return Ok(stdout);
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let code = output.status.code().unwrap_or(-1);
    debug!("Command exited with {}: {}", code, stderr.trim());
    Err(Error::non_zero_exit(code, &stderr, &stdout))
}

fn spawn_error(tool: Tool, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::tool_not_found(tool.name())
    } else {
        Error::process(format!("Failed to start {}: {}", tool, e))
    }
}

fn stream_command(program: &Path, tool: Tool, args: &[String]) -> LineStream {
    let spawned = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => return LineStream::failed(spawn_error(tool, e)),
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return LineStream::failed(Error::process("stdio was not captured"));
    };

    debug!("Stream process started with PID: {:?}", child.id());

    let (sink, kill, stream) = line_channel();
    tokio::spawn(pump_lines(child, stdout, stderr, sink, kill));
    stream
}

/// Owns the child: forwards stdout lines until EOF or kill, then reaps it.
async fn pump_lines(
    mut child: Child,
    mut stdout: ChildStdout,
    stderr: ChildStderr,
    sink: LineSink,
    mut kill: KillSignal,
) {
    let stderr_task = tokio::spawn(collect_stderr(stderr));
    let mut splitter = LineSplitter::default();
    let mut buf = vec![0u8; READ_CHUNK];

    let killed = loop {
        tokio::select! {
            _ = &mut kill => break true,
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break false,
                Ok(n) => {
                    for line in splitter.push(&buf[..n]) {
                        trace!("stream: {}", line);
                        sink.send_line(line);
                    }
                }
                Err(e) => {
                    warn!("Error reading stream output: {}", e);
                    break false;
                }
            }
        }
    };

    if !killed {
        if let Some(line) = splitter.finish() {
            sink.send_line(line);
        }

        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = &mut kill => None,
        };

        if let Some(status) = status {
            let stderr_text = stderr_task.await.unwrap_or_default();
            match status {
                Ok(status) if status.success() => info!("Stream process exited normally"),
                Ok(status) => {
                    let code = status.code().unwrap_or(-1);
                    info!("Stream process exited with code {}", code);
                    sink.send_error(Error::non_zero_exit(code, &stderr_text, ""));
                }
                Err(e) => {
                    error!("Error waiting for stream process: {}", e);
                    sink.send_error(Error::from(e));
                }
            }
            return;
        }
    }

    info!("Kill signal received, terminating stream process");
    stderr_task.abort();
    if let Err(e) = child.kill().await {
        warn!("Failed to kill stream process: {}", e);
    }
    // sink drops here, marking the stream as exited
}

/// Drain stderr for the life of the process, keeping only the last bytes.
async fn collect_stderr(mut stderr: ChildStderr) -> String {
    let mut tail = Vec::with_capacity(STDERR_TAIL_BYTES);
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => push_tail(&mut tail, &buf[..n], STDERR_TAIL_BYTES),
            Err(e) => {
                debug!("stderr read failed: {}", e);
                break;
            }
        }
    }
    String::from_utf8_lossy(&tail).into_owned()
}

fn push_tail(tail: &mut Vec<u8>, chunk: &[u8], limit: usize) {
    if chunk.len() >= limit {
        tail.clear();
        tail.extend_from_slice(&chunk[chunk.len() - limit..]);
        return;
    }
    let overflow = (tail.len() + chunk.len()).saturating_sub(limit);
    tail.drain(..overflow);
    tail.extend_from_slice(chunk);
}

// ─────────────────────────────────────────────────────────────────────────────
// Line splitting
// ─────────────────────────────────────────────────────────────────────────────

/// Splits arbitrary byte chunks into newline-delimited lines
///
/// A partial trailing line is buffered until the next chunk or [`finish`].
/// `\r\n` endings are normalised and empty lines are dropped. Splitting
/// happens on bytes, so multi-byte characters cut across chunks survive.
///
/// [`finish`]: LineSplitter::finish
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    /// Feed a chunk, returning every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(line) = decode_line(&raw[..raw.len() - 1]) {
                lines.push(line);
            }
        }
        lines
    }

    /// Flush the buffered remainder at end of output
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(raw).into_owned())
}

// ─────────────────────────────────────────────────────────────────────────────
// LineStream
// ─────────────────────────────────────────────────────────────────────────────

/// Receives the kill request for a streaming producer
pub type KillSignal = oneshot::Receiver<()>;

/// Create a connected producer/consumer pair.
///
/// The producer keeps the [`LineSink`] and watches the [`KillSignal`]; the
/// stream is marked exited when the sink is dropped.
pub fn line_channel() -> (LineSink, KillSignal, LineStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (kill_tx, kill_rx) = oneshot::channel();
    let (exited_tx, exited_rx) = watch::channel(false);

    let control = StreamControl {
        inner: Arc::new(ControlInner {
            stopped: AtomicBool::new(false),
            kill_tx: Mutex::new(Some(kill_tx)),
            exited: exited_rx,
        }),
    };

    (
        LineSink {
            tx,
            exited: exited_tx,
        },
        kill_rx,
        LineStream { rx, control },
    )
}

/// Producing half of a [`LineStream`]
#[derive(Debug)]
pub struct LineSink {
    tx: mpsc::UnboundedSender<Result<String>>,
    exited: watch::Sender<bool>,
}

impl LineSink {
    /// Returns `false` once the consumer is gone
    pub fn send_line(&self, line: impl Into<String>) -> bool {
        self.tx.send(Ok(line.into())).is_ok()
    }

    /// Terminal failure; nothing should be sent afterwards
    pub fn send_error(&self, error: Error) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

impl Drop for LineSink {
    fn drop(&mut self) {
        self.exited.send_replace(true);
    }
}

#[derive(Debug)]
struct ControlInner {
    stopped: AtomicBool,
    kill_tx: Mutex<Option<oneshot::Sender<()>>>,
    exited: watch::Receiver<bool>,
}

/// Cloneable handle that cancels a [`LineStream`]
#[derive(Debug, Clone)]
pub struct StreamControl {
    inner: Arc<ControlInner>,
}

impl StreamControl {
    /// Stop reading, terminate the producer and wait until it has exited.
    ///
    /// Idempotent. After this returns the stream yields nothing more.
    pub async fn stop(&self) {
        self.request_stop();
        let mut exited = self.inner.exited.clone();
        let _ = exited.wait_for(|done| *done).await;
    }

    /// Non-blocking half of [`stop`](Self::stop)
    pub fn request_stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        let kill_tx = match self.inner.kill_tx.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tx) = kill_tx {
            let _ = tx.send(());
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Whether the producer has finished (naturally or after a kill)
    pub fn has_exited(&self) -> bool {
        *self.inner.exited.borrow()
    }
}

/// Cancellable sequence of output lines
///
/// Yields `Some(Ok(line))` per line, `Some(Err(_))` once on failure, and
/// `None` on completion or after a stop. Dropping the stream kills the
/// producing process.
#[derive(Debug)]
pub struct LineStream {
    rx: mpsc::UnboundedReceiver<Result<String>>,
    control: StreamControl,
}

impl LineStream {
    /// A stream whose only item is `error`
    pub fn failed(error: Error) -> Self {
        let (sink, _kill, stream) = line_channel();
        sink.send_error(error);
        stream
    }

    pub async fn next_line(&mut self) -> Option<Result<String>> {
        if self.control.is_stopped() {
            return None;
        }
        let item = self.rx.recv().await?;
        if self.control.is_stopped() {
            return None;
        }
        Some(item)
    }

    pub fn control(&self) -> StreamControl {
        self.control.clone()
    }

    pub async fn stop(&self) {
        self.control.stop().await;
    }
}

impl Drop for LineStream {
    fn drop(&mut self) {
        if !self.control.has_exited() {
            debug!("LineStream dropped while producer may still be running");
            self.control.request_stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn sh(script: &str) -> (PathBuf, Vec<String>) {
        (
            PathBuf::from("sh"),
            vec!["-c".to_string(), script.to_string()],
        )
    }

    async fn drain(stream: &mut LineStream) -> Vec<Result<String>> {
        let mut items = Vec::new();
        while let Some(item) =
            tokio::time::timeout(Duration::from_secs(5), stream.next_line())
                .await
                .expect("stream did not finish in time")
        {
            items.push(item);
        }
        items
    }

    #[test]
    fn test_splitter_keeps_partial_line_across_chunks() {
        let mut splitter = LineSplitter::default();
        assert_eq!(splitter.push(b"first li"), Vec::<String>::new());
        assert_eq!(splitter.push(b"ne\nsec"), vec!["first line"]);
        assert_eq!(splitter.push(b"ond\r\n\nthird"), vec!["second"]);
        assert_eq!(splitter.finish(), Some("third".to_string()));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_splitter_multibyte_character_split() {
        let text = "로그 line\n".as_bytes();
        let mut splitter = LineSplitter::default();
        assert!(splitter.push(&text[..2]).is_empty());
        assert_eq!(splitter.push(&text[2..]), vec!["로그 line"]);
    }

    #[test]
    fn test_splitter_drops_empty_lines() {
        let mut splitter = LineSplitter::default();
        assert_eq!(splitter.push(b"\n\r\na\n\n"), vec!["a"]);
    }

    #[tokio::test]
    async fn test_run_command_returns_stdout() {
        let (program, args) = sh("echo hello");
        let out = run_command(&program, Tool::Adb, &args).await.unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn test_run_command_non_zero_exit_prefers_stderr() {
        let (program, args) = sh("echo out; echo 'bad thing' >&2; exit 3");
        let err = run_command(&program, Tool::Adb, &args).await.unwrap_err();
        assert!(matches!(
            err,
            Error::NonZeroExit { code: 3, ref description } if description == "bad thing"
        ));
    }

    #[tokio::test]
    async fn test_run_command_missing_executable() {
        let err = run_command(Path::new("/nonexistent/adb"), Tool::Adb, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { ref name } if name == "adb"));
    }

    #[tokio::test]
    async fn test_stream_delivers_lines_then_completes() {
        let (program, args) = sh("printf 'one\\ntwo\\nthree'");
        let mut stream = stream_command(&program, Tool::Xcrun, &args);
        let items = drain(&mut stream).await;
        let lines: Vec<String> = items.into_iter().map(|i| i.unwrap()).collect();
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_stream_non_zero_exit_is_terminal_failure() {
        let (program, args) = sh("echo partial; echo 'predicate invalid' >&2; exit 64");
        let mut stream = stream_command(&program, Tool::Xcrun, &args);
        let items = drain(&mut stream).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(
            items[1],
            Err(Error::NonZeroExit { code: 64, ref description }) if description == "predicate invalid"
        ));
    }

    #[test]
    fn test_stderr_tail_keeps_last_bytes() {
        let mut tail = Vec::new();
        push_tail(&mut tail, b"abcdef", 8);
        push_tail(&mut tail, b"ghij", 8);
        assert_eq!(tail, b"cdefghij");

        push_tail(&mut tail, b"0123456789", 8);
        assert_eq!(tail, b"23456789");
    }

    #[tokio::test]
    async fn test_stream_large_stderr_reports_tail() {
        let (program, args) = sh(
            "i=0; while [ $i -lt 2000 ]; do echo 'noise noise noise' >&2; i=$((i+1)); done; \
             echo 'device not found' >&2; exit 1",
        );
        let mut stream = stream_command(&program, Tool::Adb, &args);
        let items = drain(&mut stream).await;

        let Some(Err(Error::NonZeroExit { code: 1, description })) = items.last() else {
            panic!("expected a terminal non-zero exit, got {:?}", items);
        };
        assert!(description.len() <= STDERR_TAIL_BYTES);
        assert!(description.ends_with("device not found"));
    }

    #[tokio::test]
    async fn test_stream_spawn_failure_is_first_item() {
        let mut stream = stream_command(Path::new("/nonexistent/adb"), Tool::Adb, &[]);
        let items = drain(&mut stream).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::ToolNotFound { .. })));
    }

    #[tokio::test]
    async fn test_stop_kills_process_and_silences_stream() {
        let (program, args) = sh("echo ready; while true; do echo tick; sleep 0.05; done");
        let mut stream = stream_command(&program, Tool::Adb, &args);

        let first = stream.next_line().await;
        assert_eq!(first.unwrap().unwrap(), "ready");

        let control = stream.control();
        tokio::time::timeout(Duration::from_secs(5), control.stop())
            .await
            .expect("stop did not complete");

        assert!(control.has_exited());
        assert!(stream.next_line().await.is_none());
        // idempotent
        control.stop().await;
    }

    #[tokio::test]
    async fn test_dropping_stream_requests_kill() {
        let (program, args) = sh("sleep 60");
        let stream = stream_command(&program, Tool::Adb, &args);
        let control = stream.control();
        drop(stream);

        assert!(control.is_stopped());
        tokio::time::timeout(Duration::from_secs(5), control.stop())
            .await
            .expect("process was not torn down");
    }

    #[tokio::test]
    async fn test_failed_stream_has_exited() {
        let mut stream = LineStream::failed(Error::tool_not_found("xcrun"));
        assert!(stream.control().has_exited());
        assert!(matches!(
            stream.next_line().await,
            Some(Err(Error::ToolNotFound { .. }))
        ));
        assert!(stream.next_line().await.is_none());
    }
}
