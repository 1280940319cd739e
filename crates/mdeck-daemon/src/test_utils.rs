//! Test utilities for process-driven code
//!
//! [`FakeRunner`] implements [`ProcessRunner`] without spawning anything. It
//! records every call in order (including stream starts and the kills that
//! end them) and answers from scripted replies.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use mdeck_core::prelude::*;

use crate::commands::Invocation;
use crate::process::{line_channel, LineStream, ProcessRunner};

/// One observed interaction with the runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Run(Invocation),
    RunSync(Invocation),
    Detached(Invocation),
    Stream(Invocation),
    /// A pending stream for this invocation received its kill
    Kill(Invocation),
}

impl Call {
    pub fn invocation(&self) -> &Invocation {
        match self {
            Call::Run(i)
            | Call::RunSync(i)
            | Call::Detached(i)
            | Call::Stream(i)
            | Call::Kill(i) => i,
        }
    }
}

/// Scripted result of a run / spawn
#[derive(Debug, Clone)]
pub enum Reply {
    Output(String),
    Exit { code: i32, stderr: String },
    NotFound,
}

impl Reply {
    fn into_result(self, invocation: &Invocation) -> Result<String> {
        match self {
            Reply::Output(out) => Ok(out),
            Reply::Exit { code, stderr } => Err(Error::non_zero_exit(code, &stderr, "")),
            Reply::NotFound => Err(Error::tool_not_found(invocation.tool.name())),
        }
    }
}

/// Scripted behaviour of a streaming invocation
#[derive(Debug, Clone)]
pub enum ScriptedStream {
    /// Emit the lines, then end gracefully
    Lines(Vec<String>),
    /// Emit the lines, then fail with a non-zero exit
    Fail {
        lines: Vec<String>,
        code: i32,
        stderr: String,
    },
    /// Emit the lines, then stay open until killed
    Pending(Vec<String>),
    /// The executable could not be started
    SpawnFailure,
}

impl ScriptedStream {
    pub fn lines<I: IntoIterator<Item = S>, S: Into<String>>(lines: I) -> Self {
        Self::Lines(lines.into_iter().map(Into::into).collect())
    }

    pub fn pending<I: IntoIterator<Item = S>, S: Into<String>>(lines: I) -> Self {
        Self::Pending(lines.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<Call>,
    replies: HashMap<Invocation, VecDeque<Reply>>,
    streams: HashMap<Invocation, VecDeque<ScriptedStream>>,
}

/// Recording, scriptable [`ProcessRunner`]
///
/// Unscripted runs succeed with empty output; unscripted streams stay
/// pending until killed.
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue a reply for the next matching run / spawn
    pub fn reply(&self, invocation: Invocation, reply: Reply) -> &Self {
        self.state()
            .replies
            .entry(invocation)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn reply_output(&self, invocation: Invocation, output: impl Into<String>) -> &Self {
        self.reply(invocation, Reply::Output(output.into()))
    }

    pub fn reply_exit(&self, invocation: Invocation, code: i32, stderr: impl Into<String>) -> &Self {
        self.reply(
            invocation,
            Reply::Exit {
                code,
                stderr: stderr.into(),
            },
        )
    }

    /// Queue a behaviour for the next matching stream
    pub fn script_stream(&self, invocation: Invocation, script: ScriptedStream) -> &Self {
        self.state()
            .streams
            .entry(invocation)
            .or_default()
            .push_back(script);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Calls of one kind, in order
    pub fn stream_starts(&self) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Stream(i) => Some(i),
                _ => None,
            })
            .collect()
    }

    pub fn kills(&self) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Kill(i) => Some(i),
                _ => None,
            })
            .collect()
    }

    /// Whether any call used `invocation`
    pub fn was_called(&self, invocation: &Invocation) -> bool {
        self.calls().iter().any(|call| call.invocation() == invocation)
    }

    fn next_reply(&self, call: Call) -> Result<String> {
        let invocation = call.invocation().clone();
        let mut state = self.state();
        state.calls.push(call);
        let reply = state
            .replies
            .get_mut(&invocation)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Reply::Output(String::new()));
        drop(state);
        reply.into_result(&invocation)
    }
}

impl ProcessRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation) -> Result<String> {
        self.next_reply(Call::Run(invocation.clone()))
    }

    fn run_sync(&self, invocation: &Invocation) -> Result<String> {
        self.next_reply(Call::RunSync(invocation.clone()))
    }

    fn spawn_detached(&self, invocation: &Invocation) -> Result<()> {
        self.next_reply(Call::Detached(invocation.clone())).map(|_| ())
    }

    fn stream(&self, invocation: &Invocation) -> LineStream {
        let script = {
            let mut state = self.state();
            state.calls.push(Call::Stream(invocation.clone()));
            state
                .streams
                .get_mut(invocation)
                .and_then(VecDeque::pop_front)
                .unwrap_or(ScriptedStream::Pending(Vec::new()))
        };

        let (sink, kill, stream) = line_channel();
        match script {
            ScriptedStream::SpawnFailure => {
                return LineStream::failed(Error::tool_not_found(invocation.tool.name()));
            }
            ScriptedStream::Lines(lines) => {
                for line in lines {
                    sink.send_line(line);
                }
            }
            ScriptedStream::Fail {
                lines,
                code,
                stderr,
            } => {
                for line in lines {
                    sink.send_line(line);
                }
                sink.send_error(Error::non_zero_exit(code, &stderr, ""));
            }
            ScriptedStream::Pending(lines) => {
                for line in lines {
                    sink.send_line(line);
                }
                let state = Arc::clone(&self.state);
                let invocation = invocation.clone();
                tokio::spawn(async move {
                    let _ = kill.await;
                    if let Ok(mut state) = state.lock() {
                        state.calls.push(Call::Kill(invocation));
                    }
                    drop(sink);
                });
            }
        }
        stream
    }
}
