// crates/fm-harness/src/executor/process.rs
// ============================================================================
// Module: Process Driver
// Description: Bounded child-process runner with an expect-style prompt engine.
// Purpose: Share deadline and prompt handling between SSH and local executors.
// Dependencies: std::process, tracing
// ============================================================================

//! ## Overview
//! The driver spawns a prepared [`Command`], streams stdout and stderr
//! through reader threads into one channel, and answers prompts from a
//! [`PromptResponses`] map by writing the response plus a newline to stdin.
//! Prompts are matched on both streams. Every wait is bounded:
//! - the whole command is killed once `command_timeout` elapses;
//! - after the child exits, leftover output is collected for at most
//!   `EXIT_DRAIN` so a background process holding a pipe cannot stall
//!   the call;
//! - an interactive process that stays silent for `prompt_timeout` while
//!   waiting on unanswered text is killed and reported as
//!   [`HarnessError::UnmatchedPrompt`]. Unanswered text is a non-empty
//!   partial line, or a completed last line ending in `?` or `:`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::io::Write;
use std::process::Child;
use std::process::ChildStdin;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Stdio;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;

use super::ExecutionLimits;
use super::HostId;
use super::HostResult;
use crate::command::PromptResponses;
use crate::error::HarnessError;
use crate::error::HarnessResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Read buffer size for output pipes.
const READ_CHUNK: usize = 4096;
/// Maximum characters retained for prompt matching.
const MAX_PENDING_CHARS: usize = 8192;
/// Longest single wait on the output channel before re-checking the child.
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Poll interval while waiting for exit after both pipes close.
const EXIT_POLL: Duration = Duration::from_millis(10);
/// Time allowed to collect output still in flight once the child has exited.
const EXIT_DRAIN: Duration = Duration::from_millis(500);

// ============================================================================
// SECTION: Driver
// ============================================================================

/// Parameters for one driven process.
pub(super) struct ProcessSpec<'a> {
    /// Host the process acts for.
    pub host: &'a HostId,
    /// Rendered command line used in errors.
    pub rendered: &'a str,
    /// Time bounds.
    pub limits: ExecutionLimits,
    /// Prompt responses; `None` runs with stdin closed.
    pub responses: Option<&'a PromptResponses>,
}

/// Output pipe a chunk was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    /// Child stdout.
    Stdout,
    /// Child stderr.
    Stderr,
}

/// Runs `command` to completion under the limits in `spec`.
pub(super) fn run(mut command: Command, spec: &ProcessSpec<'_>) -> HarnessResult<HostResult> {
    let interactive = spec.responses.is_some();
    command
        .stdin(if interactive { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child =
        command.spawn().map_err(|err| transport(spec.host, format!("spawn failed: {err}")))?;
    let started = Instant::now();

    let stdout = child.stdout.take().ok_or_else(|| transport(spec.host, "stdout pipe missing"))?;
    let stderr = child.stderr.take().ok_or_else(|| transport(spec.host, "stderr pipe missing"))?;
    let mut stdin = child.stdin.take();
    let (tx, rx) = mpsc::channel::<(Stream, Vec<u8>)>();
    spawn_chunk_reader(stdout, Stream::Stdout, tx.clone());
    spawn_chunk_reader(stderr, Stream::Stderr, tx);

    let mut stdout_bytes: Vec<u8> = Vec::new();
    let mut stderr_bytes: Vec<u8> = Vec::new();
    let mut pending = String::new();
    let mut last_output = Instant::now();
    let mut exited: Option<(ExitStatus, Instant)> = None;
    let deadline = started + spec.limits.command_timeout;

    let status = loop {
        if exited.is_none() {
            let polled = child
                .try_wait()
                .map_err(|err| transport(spec.host, format!("wait failed: {err}")))?;
            exited = polled.map(|status| (status, Instant::now()));
        }
        let now = Instant::now();
        match exited {
            Some((status, exited_at)) if now >= deadline || now >= exited_at + EXIT_DRAIN => {
                break status;
            }
            None if now >= deadline => {
                kill(&mut child);
                return Err(timeout(spec));
            }
            _ => {}
        }
        let wait = (deadline - now).min(spec.limits.prompt_timeout).min(POLL_INTERVAL);
        match rx.recv_timeout(wait) {
            Ok((stream, chunk)) => {
                last_output = Instant::now();
                match stream {
                    Stream::Stdout => stdout_bytes.extend_from_slice(&chunk),
                    Stream::Stderr => stderr_bytes.extend_from_slice(&chunk),
                }
                if let Some(responses) = spec.responses {
                    pending.push_str(&String::from_utf8_lossy(&chunk));
                    answer_prompts(spec.host, responses, &mut pending, stdin.as_mut())?;
                    truncate_front(&mut pending, MAX_PENDING_CHARS);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                let idle = last_output.elapsed();
                if interactive
                    && exited.is_none()
                    && idle >= spec.limits.prompt_timeout
                    && let Some(waiting_on) = unanswered_prompt(&pending)
                {
                    let prompt = waiting_on.to_string();
                    kill(&mut child);
                    return Err(HarnessError::UnmatchedPrompt {
                        host: spec.host.clone(),
                        prompt,
                        waited: idle,
                    });
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Some((status, _)) = exited {
                    break status;
                }
                drop(stdin.take());
                break wait_for_exit(&mut child, deadline, spec)?;
            }
        }
    };

    Ok(HostResult {
        host: spec.host.clone(),
        exit_code: status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
    })
}

/// Waits for exit after both pipes closed, killing the child at `deadline`.
fn wait_for_exit(
    child: &mut Child,
    deadline: Instant,
    spec: &ProcessSpec<'_>,
) -> HarnessResult<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                kill(child);
                return Err(timeout(spec));
            }
            Ok(None) => thread::sleep(EXIT_POLL),
            Err(err) => return Err(transport(spec.host, format!("wait failed: {err}"))),
        }
    }
}

// ============================================================================
// SECTION: Prompt Engine
// ============================================================================

/// Answers every known prompt found in `pending`, consuming matched text.
fn answer_prompts(
    host: &HostId,
    responses: &PromptResponses,
    pending: &mut String,
    mut stdin: Option<&mut ChildStdin>,
) -> HarnessResult<()> {
    while let Some((prompt, response, end)) = responses.find_in(pending) {
        let Some(input) = stdin.as_deref_mut() else {
            return Err(transport(host, "stdin pipe missing for interactive command"));
        };
        debug!(host = %host, prompt, "answering prompt");
        input
            .write_all(response.as_bytes())
            .and_then(|()| input.write_all(b"\n"))
            .and_then(|()| input.flush())
            .map_err(|err| transport(host, format!("write prompt response failed: {err}")))?;
        pending.drain(.. end);
    }
    Ok(())
}

/// Returns the trailing text after the last newline, trimmed.
fn partial_line(pending: &str) -> &str {
    pending.rsplit('\n').next().unwrap_or_default().trim()
}

/// Returns the text an idle process appears to be waiting on.
///
/// A non-empty partial line always counts. Otherwise the last completed line
/// counts when it ends in `?` or `:`.
fn unanswered_prompt(pending: &str) -> Option<&str> {
    let partial = partial_line(pending);
    if !partial.is_empty() {
        return Some(partial);
    }
    let last_line = partial_line(pending.trim_end());
    last_line.ends_with(['?', ':']).then_some(last_line)
}

/// Keeps only the last `max_chars` characters of `text`.
fn truncate_front(text: &mut String, max_chars: usize) {
    let count = text.chars().count();
    if count <= max_chars {
        return;
    }
    let cut = text.char_indices().nth(count - max_chars).map_or(0, |(index, _)| index);
    text.drain(.. cut);
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Streams a pipe into the channel until EOF; the thread is never joined.
///
/// Dropping every sender signals that both pipes reached EOF.
fn spawn_chunk_reader<R: Read + Send + 'static>(
    mut pipe: R,
    stream: Stream,
    tx: mpsc::Sender<(Stream, Vec<u8>)>,
) {
    thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(read) => {
                    if tx.send((stream, buf[.. read].to_vec())).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Kills and reaps a child, ignoring races with natural exit.
fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Builds a transport error.
fn transport(host: &HostId, message: impl Into<String>) -> HarnessError {
    HarnessError::Transport {
        host: host.clone(),
        message: message.into(),
    }
}

/// Builds a timeout error.
fn timeout(spec: &ProcessSpec<'_>) -> HarnessError {
    HarnessError::CommandTimeout {
        host: spec.host.clone(),
        command: spec.rendered.to_string(),
        timeout: spec.limits.command_timeout,
    }
}
