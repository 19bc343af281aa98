//! Child process spawning, output capture and cancellation.

use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::request::{CommandRequest, Shell};
use super::result::{CommandResult, FAILURE_EXIT_STATUS};
use crate::error::RelayError;
use crate::Result;

/// Default buffer size for reading child output.
const READ_BUFFER_SIZE: usize = 4096;

/// Growable byte buffer shared between a pipe reader and its observers.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl OutputBuffer {
    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append(&self, bytes: &[u8]) {
        self.lock().extend_from_slice(bytes);
    }

    /// Everything captured so far, decoded lossily.
    pub fn snapshot(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read-only view of a running command's captured output.
#[derive(Debug, Clone, Default)]
pub struct OutputHandle {
    pub stdout: OutputBuffer,
    pub stderr: OutputBuffer,
}

impl OutputHandle {
    /// Current buffers as an in-progress result. The exit status of an
    /// unfinished run is reported as 0.
    pub fn snapshot(&self) -> CommandResult {
        CommandResult::new(self.stdout.snapshot(), self.stderr.snapshot(), 0)
    }
}

/// Drain a child pipe into `buffer` until EOF.
async fn capture<R>(mut pipe: R, buffer: OutputBuffer)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => buffer.append(&buf[..n]),
            Err(e) => {
                debug!("pipe read failed: {}", e);
                break;
            }
        }
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Spawns commands through the host shell.
///
/// Holds configuration only, so one runner serves any number of concurrent
/// calls.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    shell: Shell,
}

impl CommandRunner {
    pub fn new(shell: Shell) -> Self {
        Self { shell }
    }

    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    fn build(&self, request: &CommandRequest) -> Command {
        let mut command = Command::new(&self.shell.program);
        command.arg(&self.shell.arg);

        // cmd.exe does its own parsing; quoting would change the command
        #[cfg(windows)]
        command.raw_arg(&request.command);
        #[cfg(not(windows))]
        command.arg(&request.command);

        if let Some(dir) = request.working_dir() {
            command.current_dir(dir);
        }

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Start the command without waiting for it.
    pub fn spawn(&self, request: &CommandRequest) -> Result<RunningCommand> {
        debug!(
            command = %request.command,
            cwd = %request.working_directory,
            "spawning command"
        );

        let mut child = self
            .build(request)
            .spawn()
            .map_err(|e| RelayError::Spawn(e.to_string()))?;

        let output = OutputHandle::default();
        let mut readers = Vec::with_capacity(2);
        if let Some(pipe) = child.stdout.take() {
            readers.push(tokio::spawn(capture(pipe, output.stdout.clone())));
        }
        if let Some(pipe) = child.stderr.take() {
            readers.push(tokio::spawn(capture(pipe, output.stderr.clone())));
        }

        Ok(RunningCommand {
            pid: child.id(),
            child,
            output,
            readers,
            // A deadline too far out to represent never fires
            deadline: request
                .deadline()
                .and_then(|d| Instant::now().checked_add(d)),
        })
    }

    /// Run a command to completion or until `cancel` fires.
    ///
    /// Never fails: spawn errors and cancellation are folded into the
    /// returned [`CommandResult`]. The child is gone when this returns.
    pub async fn run(&self, request: &CommandRequest, cancel: &CancellationToken) -> CommandResult {
        match self.spawn(request) {
            Ok(mut running) => running.wait_or_cancel(cancel).await,
            Err(e) => {
                warn!(command = %request.command, "{}", e);
                CommandResult::spawn_failed(&e)
            }
        }
    }
}

/// A spawned child with its output capture in flight.
#[derive(Debug)]
pub struct RunningCommand {
    child: Child,
    pid: Option<u32>,
    output: OutputHandle,
    readers: Vec<JoinHandle<()>>,
    deadline: Option<Instant>,
}

impl RunningCommand {
    /// Shared view of the output captured so far.
    pub fn output(&self) -> OutputHandle {
        self.output.clone()
    }

    /// Wait for natural exit and collect everything the child wrote.
    async fn complete(&mut self) -> CommandResult {
        let status = self.child.wait().await;

        // Pipes hit EOF once the child and anything holding them exit
        for reader in self.readers.iter_mut() {
            let _ = reader.await;
        }
        self.readers.clear();

        let exit_status = match status {
            Ok(status) => exit_status(status),
            Err(e) => {
                warn!(pid = ?self.pid, "waiting for child failed: {}", e);
                FAILURE_EXIT_STATUS
            }
        };

        self.collect(exit_status)
    }

    fn collect(&self, exit_status: i32) -> CommandResult {
        CommandResult::new(
            self.output.stdout.snapshot(),
            self.output.stderr.snapshot(),
            exit_status,
        )
    }

    /// Wait for the child, racing cancellation and the request deadline.
    ///
    /// Whichever fires first wins. On cancellation or deadline the child is
    /// killed and reaped and the cancellation sentinel is returned, unless
    /// the child had already exited and only a grandchild still held its
    /// pipes; then the real exit status is kept.
    pub async fn wait_or_cancel(&mut self, cancel: &CancellationToken) -> CommandResult {
        let (pid, deadline) = (self.pid, self.deadline);
        let finished = tokio::select! {
            result = self.complete() => Some(result),
            _ = cancel.cancelled() => {
                info!(pid = ?pid, "request cancelled, killing child");
                None
            }
            _ = deadline_elapsed(deadline) => {
                info!(pid = ?pid, "deadline elapsed, killing child");
                None
            }
        };

        if let Some(result) = finished {
            return result;
        }

        if let Ok(Some(status)) = self.child.try_wait() {
            debug!(pid = ?pid, "child already exited, keeping its status");
            self.abort_readers();
            return self.collect(exit_status(status));
        }

        self.kill().await;
        CommandResult::cancelled()
    }

    /// Forcefully terminate the child and wait for it to be reaped.
    ///
    /// Grandchildren the shell started are not tracked and may survive.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!(pid = ?self.pid, "kill failed: {}", e);
        }
        self.abort_readers();
    }

    fn abort_readers(&mut self) {
        for reader in self.readers.drain(..) {
            reader.abort();
        }
    }
}

fn exit_status(status: ExitStatus) -> i32 {
    if status.success() {
        0
    } else {
        status.code().unwrap_or(FAILURE_EXIT_STATUS)
    }
}
