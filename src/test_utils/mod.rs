//! Test utilities for appboot
//!
//! In-memory stand-ins for every capability the pipeline depends on, so
//! feed, download, verify and install behaviour can be exercised without a
//! network or real installers:
//!
//! - [`FakeTransport`] - serves canned bodies per URL, records requests
//! - [`ScriptedRunner`] - answers commands by program (and first argument), records calls
//! - [`RecordingView`] - captures every status text and percentage
//!
//! # Example
//!
//! ```rust,no_run
//! use appboot_cli::test_utils::{FakeTransport, ScriptedRunner};
//!
//! let transport = FakeTransport::new().body("https://feeds.example.com/release/win/x86", b"{}".to_vec());
//! let runner = ScriptedRunner::new().fail("cmd.exe", 1);
//! ```

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Mutex, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::install::process::{ProcessCommand, ProcessOutput, ProcessRunner};
use crate::transport::{HttpBody, HttpTransport, TransportError};
use crate::view::ProgressView;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` if given, else `RUST_LOG`; does nothing if neither is set.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

#[derive(Clone)]
enum Response {
    Body {
        bytes: Vec<u8>,
        chunk_size: usize,
    },
    Error(String),
    FailAfter {
        bytes: Vec<u8>,
        message: String,
    },
    Hang,
}

/// [`HttpTransport`] serving canned responses per URL.
///
/// Unknown URLs fail with a `404` transport error.
#[derive(Default)]
pub struct FakeTransport {
    responses: HashMap<String, Response>,
    requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    /// Transport with no responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `url` in 1 KiB chunks.
    #[must_use]
    pub fn body(self, url: &str, bytes: Vec<u8>) -> Self {
        self.chunked(url, bytes, 1024)
    }

    /// Serve `bytes` for `url` in `chunk_size` pieces.
    #[must_use]
    pub fn chunked(mut self, url: &str, bytes: Vec<u8>, chunk_size: usize) -> Self {
        self.responses.insert(
            url.to_string(),
            Response::Body {
                bytes,
                chunk_size,
            },
        );
        self
    }

    /// Fail the request for `url`.
    #[must_use]
    pub fn error(mut self, url: &str, message: &str) -> Self {
        self.responses.insert(url.to_string(), Response::Error(message.to_string()));
        self
    }

    /// Deliver `bytes` for `url`, then fail the stream.
    #[must_use]
    pub fn fail_after(mut self, url: &str, bytes: Vec<u8>, message: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Response::FailAfter {
                bytes,
                message: message.to_string(),
            },
        );
        self
    }

    /// Accept the request for `url` but never deliver a byte.
    #[must_use]
    pub fn hang(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), Response::Hang);
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, url: &str) -> Result<HttpBody, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }

        match self.responses.get(url).cloned() {
            Some(Response::Body {
                bytes,
                chunk_size,
            }) => Ok(HttpBody::from_bytes(bytes, chunk_size)),
            Some(Response::Error(message)) => Err(TransportError::new(message)),
            Some(Response::FailAfter {
                bytes,
                message,
            }) => {
                let chunks = vec![Ok(bytes), Err(TransportError::new(message))];
                Ok(HttpBody {
                    content_length: None,
                    chunks: futures::stream::iter(chunks).boxed(),
                })
            }
            Some(Response::Hang) => Ok(HttpBody {
                content_length: None,
                chunks: futures::stream::pending().boxed(),
            }),
            None => Err(TransportError::new(format!("HTTP 404 Not Found for {url}"))),
        }
    }
}

#[derive(Clone)]
enum Reply {
    Output(ProcessOutput),
    SpawnError,
}

type Effect = Box<dyn Fn(&ProcessCommand) + Send + Sync>;

/// [`ProcessRunner`] answering by program name.
///
/// Replies registered for a program and its first argument take precedence
/// over replies for the program alone. Unscripted programs succeed with empty
/// output.
#[derive(Default)]
pub struct ScriptedRunner {
    replies: HashMap<String, Reply>,
    arg_replies: HashMap<(String, String), Reply>,
    effects: HashMap<String, Effect>,
    calls: Mutex<Vec<ProcessCommand>>,
}

fn output(code: i32, stdout: &str, stderr: String) -> Reply {
    Reply::Output(ProcessOutput {
        code: Some(code),
        stdout: stdout.to_string(),
        stderr,
    })
}

impl ScriptedRunner {
    /// Runner where every program succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `program` succeeds printing `stdout`.
    #[must_use]
    pub fn stdout(mut self, program: &str, stdout: &str) -> Self {
        self.replies.insert(program.to_string(), output(0, stdout, String::new()));
        self
    }

    /// `program` exits with `code` and prints `<program> failed` to stderr.
    #[must_use]
    pub fn fail(mut self, program: &str, code: i32) -> Self {
        self.replies.insert(program.to_string(), output(code, "", format!("{program} failed")));
        self
    }

    /// `program <first_arg> ...` succeeds printing `stdout`.
    #[must_use]
    pub fn stdout_when(mut self, program: &str, first_arg: &str, stdout: &str) -> Self {
        self.arg_replies
            .insert((program.to_string(), first_arg.to_string()), output(0, stdout, String::new()));
        self
    }

    /// `program <first_arg> ...` exits with `code`.
    #[must_use]
    pub fn fail_when(mut self, program: &str, first_arg: &str, code: i32) -> Self {
        self.arg_replies.insert(
            (program.to_string(), first_arg.to_string()),
            output(code, "", format!("{program} {first_arg} failed")),
        );
        self
    }

    /// `program` cannot be started.
    #[must_use]
    pub fn missing(mut self, program: &str) -> Self {
        self.replies.insert(program.to_string(), Reply::SpawnError);
        self
    }

    /// Run `effect` whenever `program` is invoked, before replying.
    #[must_use]
    pub fn on_run<F>(mut self, program: &str, effect: F) -> Self
    where
        F: Fn(&ProcessCommand) + Send + Sync + 'static,
    {
        self.effects.insert(program.to_string(), Box::new(effect));
        self
    }

    /// Make `tar` write `files` (relative path, contents) into its `-C` directory.
    #[must_use]
    pub fn unpacks(self, files: Vec<(String, Vec<u8>)>) -> Self {
        self.on_run("tar", move |command| {
            let args = command.arguments();
            let Some(target) = args.iter().position(|a| a == "-C").and_then(|i| args.get(i + 1)) else {
                return;
            };
            for (name, bytes) in &files {
                let path = std::path::Path::new(target).join(name);
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                let _ = std::fs::write(path, bytes);
            }
        })
    }

    /// Every command run so far.
    pub fn calls(&self) -> Vec<ProcessCommand> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Program names run so far.
    pub fn programs(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.program().to_string()).collect()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &ProcessCommand) -> std::io::Result<ProcessOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }
        if let Some(effect) = self.effects.get(command.program()) {
            effect(command);
        }

        let by_arg = command
            .arguments()
            .first()
            .and_then(|arg| self.arg_replies.get(&(command.program().to_string(), arg.clone())));

        match by_arg.or_else(|| self.replies.get(command.program())) {
            Some(Reply::Output(output)) => Ok(output.clone()),
            Some(Reply::SpawnError) => {
                Err(std::io::Error::new(std::io::ErrorKind::NotFound, "program not found"))
            }
            None => Ok(ProcessOutput {
                code: Some(0),
                ..ProcessOutput::default()
            }),
        }
    }
}

/// [`ProgressView`] that records everything it is told.
#[derive(Default)]
pub struct RecordingView {
    statuses: Mutex<Vec<String>>,
    percents: Mutex<Vec<Option<u8>>>,
    closed: Mutex<bool>,
    abandoned: Mutex<bool>,
}

impl RecordingView {
    /// Empty recording.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every status text, in order.
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Most recent status text.
    pub fn last_status(&self) -> Option<String> {
        self.statuses().pop()
    }

    /// Every percentage update, in order.
    pub fn percents(&self) -> Vec<Option<u8>> {
        self.percents.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Whether [`ProgressView::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.lock().map(|c| *c).unwrap_or(false)
    }

    /// Whether [`ProgressView::abandon`] was called.
    pub fn is_abandoned(&self) -> bool {
        self.abandoned.lock().map(|a| *a).unwrap_or(false)
    }
}

impl ProgressView for RecordingView {
    fn set_status_text(&self, text: &str) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.push(text.to_string());
        }
    }

    fn set_progress_percent(&self, percent: Option<u8>) {
        if let Ok(mut percents) = self.percents.lock() {
            percents.push(percent);
        }
    }

    fn close(&self) {
        if let Ok(mut closed) = self.closed.lock() {
            *closed = true;
        }
    }

    fn abandon(&self) {
        if let Ok(mut abandoned) = self.abandoned.lock() {
            *abandoned = true;
        }
    }
}
