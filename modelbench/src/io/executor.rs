//! Subprocess execution with bounded timeouts and optional line streaming.
//!
//! The [`ProcessRunner`] trait decouples adapters from the actual process
//! backend. Tests use spy runners that capture argv/stdin without spawning
//! anything; production code uses [`SubprocessExecutor`].
//!
//! Children are spawned as their own process group so that a timeout can
//! take down the whole subtree, not just the immediate child.

use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::redaction::redact_args;

/// Exit code reported when the requested binary cannot be resolved.
pub const EXIT_NOT_FOUND: i32 = 127;

/// How often the streaming loop re-checks the wall-clock deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captured outcome of one subprocess invocation.
///
/// Created fresh per call and immutable once returned. `timed_out == true`
/// means `exit_code` reflects a forced kill rather than a natural exit.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub wall_time_ms: u64,
    pub timed_out: bool,
    /// Elapsed time to the first non-whitespace chunk (streaming mode only).
    pub ttft_ms: Option<u64>,
    /// Stdout lines in emission order (empty unless streaming).
    pub chunks: Vec<String>,
}

impl ExecutionResult {
    fn spawn_failure(exit_code: i32, stderr: String, start: Instant) -> Self {
        Self {
            stdout: String::new(),
            stderr,
            exit_code,
            wall_time_ms: elapsed_ms(start),
            timed_out: false,
            ttft_ms: None,
            chunks: Vec::new(),
        }
    }
}

/// Abstraction over subprocess execution backends.
pub trait ProcessRunner {
    /// Run `args` to completion or timeout, capturing stdout/stderr.
    ///
    /// When `on_chunk` is provided the call runs in streaming mode: every
    /// complete stdout line is delivered to the callback, in order, on the
    /// calling thread. Stderr is captured but never passed to the callback.
    fn run(
        &self,
        args: &[String],
        stdin: Option<&str>,
        cwd: Option<&Path>,
        timeout: Duration,
        on_chunk: Option<&mut dyn FnMut(&str)>,
    ) -> ExecutionResult;

    /// Run a command with the prompt delivered over stdin.
    ///
    /// Semantically identical to `run` with `stdin = Some(prompt)`. The
    /// separate name is the calling convention made explicit: prompts go
    /// over stdin, never into argv, where any local user could read them
    /// out of the process table.
    fn run_with_stdin_prompt(
        &self,
        args: &[String],
        prompt: &str,
        cwd: Option<&Path>,
        timeout: Duration,
        on_chunk: Option<&mut dyn FnMut(&str)>,
    ) -> ExecutionResult {
        self.run(args, Some(prompt), cwd, timeout, on_chunk)
    }
}

/// Executes real subprocesses with process-group isolation.
#[derive(Debug, Default)]
pub struct SubprocessExecutor {
    env: Vec<(String, String)>,
}

impl SubprocessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add environment overrides applied to every spawned child.
    #[must_use]
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }
}

impl ProcessRunner for SubprocessExecutor {
    #[instrument(skip_all, fields(binary = %args.first().map(String::as_str).unwrap_or(""), timeout_ms = timeout.as_millis() as u64, streaming = on_chunk.is_some()))]
    fn run(
        &self,
        args: &[String],
        stdin: Option<&str>,
        cwd: Option<&Path>,
        timeout: Duration,
        on_chunk: Option<&mut dyn FnMut(&str)>,
    ) -> ExecutionResult {
        debug_assert!(!args.is_empty(), "args must not be empty");
        debug_assert!(timeout > Duration::ZERO, "timeout must be positive");

        let start = Instant::now();
        let mut cmd = Command::new(&args[0]);
        cmd.args(&args[1..]);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // New group leader, so a timeout kill reaches the whole subtree.
            cmd.process_group(0);
        }

        debug!(args = ?redact_args(args), "spawning child process");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(binary = %args[0], "command not found");
                return ExecutionResult::spawn_failure(
                    EXIT_NOT_FOUND,
                    format!("Command not found: {}", args[0]),
                    start,
                );
            }
            Err(err) => {
                error!(err = %err, "failed to spawn command");
                return ExecutionResult::spawn_failure(1, format!("Execution error: {err}"), start);
            }
        };

        match on_chunk {
            Some(callback) => stream_child(child, stdin, timeout, start, callback),
            None => wait_child(child, stdin, timeout, start),
        }
    }
}

/// Non-streaming mode: block until exit or deadline, then drain both pipes.
fn wait_child(
    mut child: Child,
    stdin: Option<&str>,
    timeout: Duration,
    start: Instant,
) -> ExecutionResult {
    let stdout_handle = child.stdout.take().map(spawn_capture);
    let stderr_handle = child.stderr.take().map(spawn_capture);
    write_stdin(&mut child, stdin);

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => Some(status),
        Ok(None) => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "command timed out, killing process group"
            );
            timed_out = true;
            kill_process_group(&mut child);
            child.wait().ok()
        }
        Err(err) => {
            error!(err = %err, "wait for child failed");
            kill_process_group(&mut child);
            None
        }
    };

    let stdout = join_capture(stdout_handle);
    let stderr = join_capture(stderr_handle);
    let exit_code = status.map_or(1, exit_code_of);
    debug!(exit_code, timed_out, "command finished");

    ExecutionResult {
        stdout,
        stderr,
        exit_code,
        wall_time_ms: elapsed_ms(start),
        timed_out,
        ttft_ms: None,
        chunks: Vec::new(),
    }
}

enum StreamLine {
    Out(String),
    Err(String),
}

/// Streaming mode: multiplex both pipes line-by-line against a deadline.
///
/// Reader threads push complete lines into a channel; this thread polls it
/// at [`POLL_INTERVAL`] so a hung child is killed close to the requested
/// timeout instead of after the next blocking read returns.
fn stream_child(
    mut child: Child,
    stdin: Option<&str>,
    timeout: Duration,
    start: Instant,
    on_chunk: &mut dyn FnMut(&str),
) -> ExecutionResult {
    let (tx, rx) = mpsc::channel();
    if let Some(out) = child.stdout.take() {
        spawn_line_reader(out, tx.clone(), StreamLine::Out);
    }
    if let Some(err) = child.stderr.take() {
        spawn_line_reader(err, tx.clone(), StreamLine::Err);
    }
    // Readers own the remaining senders; the channel disconnects at EOF.
    drop(tx);
    write_stdin(&mut child, stdin);

    let deadline = start + timeout;
    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut chunks = Vec::new();
    let mut ttft_ms = None;
    let mut timed_out = false;

    loop {
        let now = Instant::now();
        if now >= deadline {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "command timed out, killing process group"
            );
            timed_out = true;
            kill_process_group(&mut child);
            break;
        }
        match rx.recv_timeout((deadline - now).min(POLL_INTERVAL)) {
            Ok(line) => deliver(
                line, &mut stdout, &mut stderr, &mut chunks, &mut ttft_ms, start, on_chunk,
            ),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    drain_remaining(
        &rx, &mut stdout, &mut stderr, &mut chunks, &mut ttft_ms, start, on_chunk,
    );

    let status = if timed_out {
        child.wait().ok()
    } else {
        // Pipes are closed but the child may still be running; the deadline
        // still applies to its exit.
        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(Duration::from_millis(1));
        match child.wait_timeout(remaining) {
            Ok(Some(status)) => Some(status),
            Ok(None) => {
                warn!("child closed its pipes but kept running past the deadline");
                timed_out = true;
                kill_process_group(&mut child);
                child.wait().ok()
            }
            Err(err) => {
                error!(err = %err, "wait for child failed");
                kill_process_group(&mut child);
                None
            }
        }
    };

    let exit_code = status.map_or(1, exit_code_of);
    debug!(exit_code, timed_out, chunks = chunks.len(), "command finished");

    ExecutionResult {
        stdout,
        stderr,
        exit_code,
        wall_time_ms: elapsed_ms(start),
        timed_out,
        ttft_ms,
        chunks,
    }
}

#[allow(clippy::too_many_arguments)]
fn deliver(
    line: StreamLine,
    stdout: &mut String,
    stderr: &mut String,
    chunks: &mut Vec<String>,
    ttft_ms: &mut Option<u64>,
    start: Instant,
    on_chunk: &mut dyn FnMut(&str),
) {
    match line {
        StreamLine::Out(text) => {
            stdout.push_str(&text);
            if ttft_ms.is_none() && !text.trim().is_empty() {
                *ttft_ms = Some(elapsed_ms(start));
            }
            on_chunk(&text);
            chunks.push(text);
        }
        StreamLine::Err(text) => stderr.push_str(&text),
    }
}

/// Collect whatever the readers flushed after exit or kill.
#[allow(clippy::too_many_arguments)]
fn drain_remaining(
    rx: &Receiver<StreamLine>,
    stdout: &mut String,
    stderr: &mut String,
    chunks: &mut Vec<String>,
    ttft_ms: &mut Option<u64>,
    start: Instant,
    on_chunk: &mut dyn FnMut(&str),
) {
    loop {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(line) => deliver(line, stdout, stderr, chunks, ttft_ms, start, on_chunk),
            // Disconnected, or a reader stalled after the kill; either way done.
            Err(_) => break,
        }
    }
}

/// Detached reader; it exits on EOF once the child's pipe closes.
fn spawn_line_reader<R: Read + Send + 'static>(
    reader: R,
    tx: Sender<StreamLine>,
    wrap: fn(String) -> StreamLine,
) {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line).into_owned();
                    if tx.send(wrap(text)).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

fn spawn_capture<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn join_capture(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle.map_or_else(String::new, |handle| {
        String::from_utf8_lossy(&handle.join().unwrap_or_default()).into_owned()
    })
}

fn write_stdin(child: &mut Child, stdin: Option<&str>) {
    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        // A child that exits without reading its input is not an error.
        if let Err(err) = pipe.write_all(input.as_bytes())
            && err.kind() != ErrorKind::BrokenPipe
        {
            warn!(err = %err, "failed to write stdin");
        }
    }
    // Dropping the pipe closes it, signalling EOF to the child.
}

fn exit_code_of(status: ExitStatus) -> i32 {
    // Killed-by-signal has no code; report a generic forced-exit value.
    status.code().unwrap_or(-1)
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    // The child is its own group leader; killpg reaches its descendants too.
    let group = Pid::from_raw(child.id() as i32);
    if signal::killpg(group, Signal::SIGKILL).is_err() {
        // Group already gone, or not ours to signal; try the child directly.
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}
