//! Owned external process handles.
//!
//! Children are spawned in their own process group so that a graceful stop
//! reaches every process FFmpeg forks. Platform specifics stay in this file.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::MediaResult;

/// Default time a child gets to exit after SIGTERM.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(3);

/// A long-running child process owned by one component.
#[derive(Debug)]
pub struct OwnedProcess {
    program: String,
    args: Vec<String>,
    grace: Duration,
    child: Option<Child>,
}

impl OwnedProcess {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            grace: DEFAULT_STOP_GRACE,
            child: None,
        }
    }

    /// Set how long `stop` waits before killing.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Spawn the process unless it is already running.
    ///
    /// Returns `true` if a new child was spawned.
    pub fn start(&mut self) -> MediaResult<bool> {
        if self.is_running() {
            return Ok(false);
        }

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn()?;
        debug!(program = %self.program, pid = ?child.id(), "Spawned process");
        self.child = Some(child);
        Ok(true)
    }

    /// Whether the child is alive. Reaps it if it has exited.
    pub fn is_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(program = %self.program, ?status, "Process exited");
                self.child = None;
                false
            }
            Err(e) => {
                warn!(program = %self.program, "Failed to poll process: {}", e);
                self.child = None;
                false
            }
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Stop the child: SIGTERM to its group, then kill after the grace period.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        if let Some(pid) = child.id() {
            terminate_group(pid);
        }

        match tokio::time::timeout(self.grace, child.wait()).await {
            Ok(_) => debug!(program = %self.program, "Process stopped gracefully"),
            Err(_) => {
                warn!(program = %self.program, "Process ignored SIGTERM, killing");
                if let Err(e) = child.kill().await {
                    warn!(program = %self.program, "Failed to kill process: {}", e);
                }
            }
        }
    }
}

#[cfg(unix)]
fn terminate_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        debug!(pid, "SIGTERM to process group failed: {}", e);
    }
}

#[cfg(not(unix))]
fn terminate_group(_pid: u32) {}
