//! External test execution.
//!
//! Verification only sees the [`TestRunner`] capability and its structured
//! [`TestRunReport`]. Scanning raw console output for pass markers happens
//! once, in [`TestRunReport::from_output`], at the subprocess boundary.

use std::collections::HashSet;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;

use crate::errors::{SugarError, SugarResult};

/// Marker printed by the test command when the project fails to compile.
pub const COMPILATION_ERROR_MARKER: &str = "Compilation Error";

static PASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bPASS\s+([A-Za-z0-9_]+)").unwrap());

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Assertion identifier as the test command reports it.
pub fn assertion_id(test: &str, model: &str, column: &str) -> String {
    format!("{test}_{model}_{column}")
}

/// Outcome of one model-scoped test run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestRunReport {
    pub compilation_error: bool,
    pub passed: HashSet<String>,
}

impl TestRunReport {
    pub fn from_output(output: &str) -> Self {
        if output.contains(COMPILATION_ERROR_MARKER) {
            return Self {
                compilation_error: true,
                passed: HashSet::new(),
            };
        }
        let passed = PASS_RE
            .captures_iter(output)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .collect();
        Self {
            compilation_error: false,
            passed,
        }
    }

    pub fn has_passed(&self, test: &str, model: &str, column: &str) -> bool {
        self.passed.contains(&assertion_id(test, model, column))
    }
}

/// Runs the tests of a single model.
pub trait TestRunner {
    fn run_model_tests(&self, model: &str) -> SugarResult<TestRunReport>;
}

// ---------------------------------------------------------------------------
// Subprocess adapter
// ---------------------------------------------------------------------------

/// Shells out to a test command (by default `dbt test --models <model>`),
/// buffering its whole output and killing it once `timeout` elapses.
#[derive(Clone, Debug)]
pub struct CommandTestRunner {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    timeout: Duration,
}

impl CommandTestRunner {
    pub fn new(command: &[String], working_dir: PathBuf, timeout: Duration) -> SugarResult<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| SugarError::Config("test_command must not be empty".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            working_dir,
            timeout,
        })
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<io::Result<String>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    })
}

/// Wait for a drained stream. A truncated stream is an error: missing pass
/// markers would otherwise read as failed tests.
fn collect_stream(
    stream: &str,
    handle: Option<thread::JoinHandle<io::Result<String>>>,
) -> SugarResult<String> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    match handle.join() {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(err)) => Err(SugarError::TestRunner(format!("reading test command {stream} failed: {err}"))),
        Err(_) => Err(SugarError::TestRunner(format!("reader for test command {stream} panicked"))),
    }
}

impl TestRunner for CommandTestRunner {
    fn run_model_tests(&self, model: &str) -> SugarResult<TestRunReport> {
        tracing::info!(model, program = %self.program, "running model tests");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(model)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                SugarError::TestRunner(format!("failed to start `{}`: {err}", self.program))
            })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        let deadline = Instant::now() + self.timeout;

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SugarError::TestRunnerTimeout {
                    model: model.to_string(),
                    seconds: self.timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let mut output = collect_stream("stdout", stdout)?;
        output.push_str(&collect_stream("stderr", stderr)?);
        tracing::debug!(model, %status, bytes = output.len(), "test command finished");
        Ok(TestRunReport::from_output(&output))
    }
}
