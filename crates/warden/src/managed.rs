use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use warden_core::{RegistryConfig, Result, WardenError};

use crate::shell;

/// One long-running child process launched from a shell command line.
///
/// The child's stderr is merged into its stdout; a dedicated reader on the
/// blocking pool drains the combined stream line by line into an unbounded
/// channel, from which [`get_output`](Self::get_output) collects. Lines keep
/// their trailing newline and surface in the order the child emitted them.
///
/// A stopped instance is done: build a fresh one to run the command again.
pub struct ManagedProcess {
    command: String,
    working_directory: Option<PathBuf>,
    env: HashMap<String, String>,
    output_timeout: Duration,
    child: Option<Child>,
    output_tx: UnboundedSender<String>,
    output_rx: UnboundedReceiver<String>,
    stop: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

impl ManagedProcess {
    /// Create an idle process for `command` with default settings.
    pub fn new(command: impl Into<String>) -> Self {
        Self::with_config(command, &RegistryConfig::default())
    }

    /// Create an idle process for `command`, taking the output timeout,
    /// working directory, and extra environment from `config`.
    pub fn with_config(command: impl Into<String>, config: &RegistryConfig) -> Self {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        Self {
            command: command.into(),
            working_directory: config.working_directory.clone(),
            env: config.env.clone(),
            output_timeout: config.output_timeout(),
            child: None,
            output_tx,
            output_rx,
            stop: CancellationToken::new(),
            reader: None,
        }
    }

    /// The shell command line this process was built from.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// PID of the live child, `None` when idle.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.id())
    }

    /// Check whether the child is still alive (non-blocking).
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Spawn the command through the platform shell and attach the reader.
    ///
    /// Fails with [`WardenError::AlreadyRunning`] when a child is already
    /// live; spawn refusals from the OS surface as [`WardenError::Spawn`].
    pub fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Err(WardenError::AlreadyRunning);
        }

        let mut cmd = shell::shell_command(&self.command);
        if let Some(dir) = &self.working_directory {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        // Both stream slots get write ends of one pipe, so stderr is merged
        // into stdout with the interleaving the child actually produced.
        let (pipe_rx, pipe_tx) = std::io::pipe()?;
        cmd.stdout(pipe_tx.try_clone()?);
        cmd.stderr(pipe_tx);

        let child = cmd.spawn().map_err(WardenError::Spawn)?;
        // The write ends now live in the child; dropping the parent's copies
        // lets the reader see EOF once the child exits.
        drop(cmd);

        let tx = self.output_tx.clone();
        let stop = self.stop.clone();
        let command = self.command.clone();
        self.reader = Some(tokio::task::spawn_blocking(move || {
            let mut stream = BufReader::new(pipe_rx);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match stream.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf).into_owned();
                        if tx.send(line).is_err() {
                            break;
                        }
                        // Checked once per line; an in-flight read may still block.
                        if stop.is_cancelled() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!("Output reader for '{command}' failed: {err}");
                        break;
                    }
                }
            }
            debug!("Output reader for '{command}' exited");
        }));

        if let Some(pid) = child.id() {
            info!("Started process '{}' (PID: {pid})", self.command);
        }
        self.child = Some(child);
        Ok(())
    }

    /// Terminate the child and tear the reader down.
    ///
    /// No-op when idle, so calling it again after a successful stop is safe.
    /// Waits for the child to exit and for the reader to join with no
    /// timeout; a child that ignores the termination signal and keeps its
    /// output open makes this hang. The signal reaches the shell process
    /// only: when the shell forks instead of exec'ing (compound commands),
    /// its descendants are not signalled, and a surviving descendant keeps
    /// the merged-output pipe open until it exits on its own.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        self.stop.cancel();
        terminate(&mut child);
        let status = child.wait().await?;
        debug!("Process '{}' exited with {status}", self.command);

        if let Some(reader) = self.reader.take() {
            reader.await.map_err(|_| WardenError::ReaderPanicked)?;
        }
        Ok(())
    }

    /// Drain everything currently buffered, using the configured timeout.
    pub async fn get_output(&mut self) -> String {
        let timeout = self.output_timeout;
        self.get_output_within(timeout).await
    }

    /// Drain everything currently buffered into one string.
    ///
    /// Blocks up to `timeout` for the first line when the buffer is empty,
    /// then keeps draining with the same budget per line until nothing more
    /// arrives. Returns `""` when the window passes with no output. Safe to
    /// call while the reader is still appending, and after a stop for
    /// whatever remained buffered.
    pub async fn get_output_within(&mut self, timeout: Duration) -> String {
        let mut output = String::new();
        loop {
            match tokio::time::timeout(timeout, self.output_rx.recv()).await {
                Ok(Some(line)) => output.push_str(&line),
                Ok(None) | Err(_) => break,
            }
        }
        output
    }
}

/// Ask the child to terminate: SIGTERM on Unix, a hard kill elsewhere.
/// A child that already exited is not an error.
#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => debug!("Sent SIGTERM to process {pid}"),
            Err(nix::errno::Errno::ESRCH) => debug!("Process {pid} already exited"),
            Err(err) => warn!("Failed to send SIGTERM to process {pid}: {err}"),
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        warn!("Failed to terminate process: {err}");
    }
}
