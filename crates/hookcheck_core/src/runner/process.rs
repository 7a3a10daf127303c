//! Subprocess spawning, output capture and deadline enforcement.
//!
//! Each command runs on a private current-thread tokio runtime, so callers
//! stay synchronous. The deadline covers the whole run, including draining
//! output: a hook that backgrounds a process holding the pipes open still
//! times out.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWriteExt as _};
use tokio::process::{Child, ChildStdin, Command};
#[cfg(feature = "tracing")]
use tracing::{debug, warn};

use super::{ExecutionResult, RunError, RunOptions, is_repository_env};

/// Everything needed to launch one subprocess.
pub(super) struct Invocation<'a> {
    pub program: &'a OsStr,
    pub args: &'a [&'a OsStr],
    pub dir: &'a Path,
    pub env: &'a [(String, String)],
}

impl Invocation<'_> {
    fn command_line(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    fn command(&self, piped_stdin: bool) -> Command {
        let mut command = Command::new(self.program);
        command
            .args(self.args)
            .current_dir(self.dir)
            .stdin(if piped_stdin { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, _) in std::env::vars_os() {
            if is_repository_env(&key) {
                command.env_remove(key);
            }
        }

        for (key, value) in self.env {
            if !is_repository_env(OsStr::new(key)) {
                command.env(key, value);
            }
        }

        // Hooks run as grandchildren; a fresh group lets us kill them too.
        #[cfg(unix)]
        command.process_group(0);

        command
    }
}

/// Why a run was cut short.
enum Interrupt {
    Deadline(Duration),
    Cancelled,
}

/// Output of a child that ran to completion.
struct Captured {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

pub(super) fn execute(invocation: &Invocation<'_>, options: &RunOptions) -> Result<ExecutionResult, RunError> {
    let command_line = invocation.command_line();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|source| RunError::Io {
            command: command_line.clone(),
            source,
        })?;

    runtime.block_on(execute_async(invocation, options, command_line))
}

async fn execute_async(
    invocation: &Invocation<'_>,
    options: &RunOptions,
    command_line: String,
) -> Result<ExecutionResult, RunError> {
    if options.cancel.as_ref().is_some_and(super::CancelToken::is_cancelled) {
        return Err(RunError::Cancelled { command: command_line });
    }

    #[cfg(feature = "tracing")]
    debug!(command = %command_line, dir = %invocation.dir.display(), "spawning");

    let start = Instant::now();
    let mut child = invocation
        .command(options.stdin.is_some())
        .spawn()
        .map_err(|source| RunError::Spawn {
            command: command_line.clone(),
            source,
        })?;
    let group = child.id();

    let finished = supervise(&mut child, options).await;

    match finished {
        Ok(captured) => {
            let captured = captured.map_err(|source| RunError::Io {
                command: command_line.clone(),
                source,
            })?;

            Ok(ExecutionResult {
                status: exit_code(captured.status),
                stdout: String::from_utf8_lossy(&captured.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&captured.stderr).into_owned(),
                duration: start.elapsed(),
            })
        }
        Err(Interrupt::Deadline(timeout)) => {
            #[cfg(feature = "tracing")]
            warn!(command = %command_line, ?timeout, "deadline exceeded, killing");

            terminate(&mut child, group).await;
            Err(RunError::Timeout {
                command: command_line,
                timeout,
            })
        }
        Err(Interrupt::Cancelled) => {
            #[cfg(feature = "tracing")]
            warn!(command = %command_line, "cancelled, killing");

            terminate(&mut child, group).await;
            Err(RunError::Cancelled { command: command_line })
        }
    }
}

/// Waits for the child and both output pipes, racing the deadline and the
/// cancellation token.
async fn supervise(child: &mut Child, options: &RunOptions) -> Result<io::Result<Captured>, Interrupt> {
    let run = capture(child, options.stdin.as_deref());

    let bounded = async move {
        match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, run)
                .await
                .map_err(|_elapsed| Interrupt::Deadline(timeout)),
            None => Ok(run.await),
        }
    };

    match &options.cancel {
        Some(cancel) => {
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(Interrupt::Cancelled),
                finished = bounded => finished,
            }
        }
        None => bounded.await,
    }
}

async fn capture(child: &mut Child, stdin: Option<&[u8]>) -> io::Result<Captured> {
    let input = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (status, stdout, stderr, ()) = tokio::join!(
        child.wait(),
        read_all(stdout),
        read_all(stderr),
        feed(input, stdin),
    );

    Ok(Captured {
        status: status?,
        stdout: stdout?,
        stderr: stderr?,
    })
}

async fn feed(pipe: Option<ChildStdin>, payload: Option<&[u8]>) {
    if let (Some(mut pipe), Some(payload)) = (pipe, payload) {
        // The child may exit without reading; a broken pipe is not our failure.
        let _ = pipe.write_all(payload).await;
    }
}

async fn read_all<R: AsyncRead + Unpin>(source: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut source) = source {
        source.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt as _;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Kills the child's whole process group, then the child itself.
///
/// The group is signalled even when the leader has already exited, since
/// background processes a hook started may still hold the output pipes.
#[cfg(unix)]
async fn terminate(child: &mut Child, group: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Some(pid) = group.and_then(|id| i32::try_from(id).ok()) {
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }
    let _ = child.kill().await;
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child, _group: Option<u32>) {
    let _ = child.kill().await;
}
