use std::collections::HashMap;

use tracing::{info, warn};

use warden_core::{RegistryConfig, Result};

use crate::managed::ManagedProcess;

/// Name-keyed table of currently running managed processes.
///
/// A name is present exactly while its process has been started and not yet
/// stopped. Every operation answers with a human-readable status string;
/// only OS-level spawn failures surface as errors. Create one registry per
/// session, hand it by reference to whichever layer needs it, and call
/// [`cleanup`](Self::cleanup) on the way out; [`Drop`] only backstops the
/// paths that skipped it.
pub struct ProcessRegistry {
    config: RegistryConfig,
    processes: HashMap<String, ManagedProcess>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            processes: HashMap::new(),
        }
    }

    /// Number of currently running processes.
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Whether `name` is registered (started and not yet stopped).
    pub fn contains(&self, name: &str) -> bool {
        self.processes.contains_key(name)
    }

    /// PID of the child registered under `name`, `None` when unregistered
    /// or already exited.
    pub fn pid_of(&self, name: &str) -> Option<u32> {
        self.processes.get(name).and_then(ManagedProcess::pid)
    }

    /// Spawn `command` under `name`.
    ///
    /// A name already in use is reported, not restarted. Spawn failures
    /// propagate to the caller with nothing registered.
    pub fn start_subprocess(&mut self, name: &str, command: &str) -> Result<String> {
        if self.processes.contains_key(name) {
            return Ok(format!("Subprocess '{name}' is already running"));
        }

        let mut process = ManagedProcess::with_config(command, &self.config);
        process.start()?;
        self.processes.insert(name.to_string(), process);

        info!("Registered subprocess '{name}' running: {command}");
        Ok(format!("Started subprocess '{name}' with command: {command}"))
    }

    /// Stop the process registered under `name` and remove it.
    pub async fn stop_subprocess(&mut self, name: &str) -> Result<String> {
        let Some(process) = self.processes.get_mut(name) else {
            return Ok(format!("No subprocess named '{name}' is running"));
        };

        process.stop().await?;
        self.processes.remove(name);

        info!("Stopped subprocess '{name}'");
        Ok(format!("Stopped subprocess '{name}'"))
    }

    /// Drain whatever output `name` has buffered, waiting up to the
    /// configured timeout. An unregistered name gets the same "not running"
    /// status a stop would, never an error.
    pub async fn get_subprocess_output(&mut self, name: &str) -> String {
        match self.processes.get_mut(name) {
            Some(process) => process.get_output().await,
            None => format!("No subprocess named '{name}' is running"),
        }
    }

    /// Stop and remove every registered process.
    pub async fn cleanup(&mut self) -> Result<()> {
        let names: Vec<String> = self.processes.keys().cloned().collect();
        if !names.is_empty() {
            info!("Cleaning up {} subprocess(es)", names.len());
        }
        for name in names {
            self.stop_subprocess(&name).await?;
        }
        Ok(())
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Emergency teardown for sessions that never reached cleanup(). Drop cannot
// await, so this only delivers a best-effort termination signal per child.
impl Drop for ProcessRegistry {
    fn drop(&mut self) {
        if self.processes.is_empty() {
            return;
        }

        warn!(
            "ProcessRegistry dropped with {} running subprocess(es) - attempting emergency cleanup",
            self.processes.len()
        );

        for (name, process) in &self.processes {
            let Some(pid) = process.pid() else {
                continue;
            };

            #[cfg(unix)]
            {
                use nix::sys::signal::{self, Signal};
                use nix::unistd::Pid;

                if let Err(err) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    warn!("Emergency cleanup failed for subprocess '{name}' (PID: {pid}): {err}");
                }
            }

            #[cfg(windows)]
            {
                use std::process::Command;

                if let Err(err) = Command::new("taskkill")
                    .args(["/F", "/T", "/PID", &pid.to_string()])
                    .output()
                {
                    warn!("Emergency cleanup failed for subprocess '{name}' (PID: {pid}): {err}");
                }
            }
        }
    }
}
