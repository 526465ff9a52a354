// src/server/process.rs
use crate::error::{Error, Result};
use async_process::{Child, Command, Stdio};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Unique identifier for one launch of the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchId(Uuid);

impl LaunchId {
    /// Generate a fresh launch ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LaunchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LaunchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a server process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// Server is running
    Running,
    /// A graceful stop was requested
    Stopping,
    /// Server has exited
    Exited,
}

/// Everything needed to start the server once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable to run
    pub program: PathBuf,
    /// Command-line arguments
    pub args: Vec<String>,
    /// Working directory for the process
    pub working_dir: PathBuf,
    /// Variables added to the inherited environment
    pub env: Vec<(String, String)>,
}

/// How and when a server process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitObservation {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Terminating signal, if the process was killed by one (Unix only)
    pub signal: Option<i32>,
    /// Time between launch and exit
    pub lifetime: Duration,
}

impl ExitObservation {
    /// Whether the process exited with code 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Whether the exit looks like a SIGKILL, usually from the OOM killer
    pub fn killed_by_os(&self) -> bool {
        self.signal == Some(9) || matches!(self.code, Some(137) | Some(-9))
    }
}

impl fmt::Display for ExitObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// Handle to one running instance of the managed server.
///
/// Implementations own the child; dropping the handle does not stop it.
#[async_trait]
pub trait ManagedProcess: Send {
    /// ID of this launch
    fn id(&self) -> LaunchId;

    /// OS process ID, if known
    fn pid(&self) -> Option<u32>;

    /// Wait for the process to exit.
    ///
    /// Must be safe to cancel and call again.
    async fn wait(&mut self) -> Result<ExitObservation>;

    /// Ask the process to shut down cleanly. Best effort.
    fn request_graceful_stop(&mut self) -> Result<()>;

    /// Forcefully terminate the process.
    fn kill(&mut self) -> Result<()>;
}

/// Starts server processes.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Start the process described by `spec`.
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ManagedProcess>>;
}

/// Launches the real server binary with inherited stdio.
///
/// Output is not piped: the server writes straight to the manager's console,
/// which keeps panel consoles live and avoids pipe back-pressure.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServerLauncher;

#[async_trait]
impl ProcessLauncher for ServerLauncher {
    #[tracing::instrument(skip(self, spec), fields(program = %spec.program.display()))]
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ManagedProcess>> {
        let process = ServerProcess::spawn(spec)?;
        Ok(Box::new(process))
    }
}

/// A running server process
pub struct ServerProcess {
    /// Launch ID
    id: LaunchId,
    /// Child process
    child: Child,
    /// When the process was spawned
    started_at: Instant,
    /// Server status
    status: ServerStatus,
}

impl ServerProcess {
    /// Spawn the server process
    pub fn spawn(spec: &LaunchSpec) -> Result<Self> {
        if !spec.program.exists() {
            return Err(Error::Launch(format!(
                "Executable not found: {}",
                spec.program.display()
            )));
        }

        let mut command = Command::new(&spec.program);
        command.args(&spec.args).current_dir(&spec.working_dir);

        for (key, value) in &spec.env {
            command.env(key, value);
        }

        command
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = command.spawn().map_err(|e| {
            Error::Launch(format!(
                "Failed to start {}: {}",
                spec.program.display(),
                e
            ))
        })?;

        let process = Self {
            id: LaunchId::new(),
            child,
            started_at: Instant::now(),
            status: ServerStatus::Running,
        };
        tracing::info!(launch_id = %process.id, pid = process.child.id(), "Server process started");
        Ok(process)
    }

    /// Get the server status
    pub fn status(&self) -> ServerStatus {
        self.status
    }
}

#[async_trait]
impl ManagedProcess for ServerProcess {
    fn id(&self) -> LaunchId {
        self.id
    }

    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    async fn wait(&mut self) -> Result<ExitObservation> {
        let status = self
            .child
            .status()
            .await
            .map_err(|e| Error::Process(format!("Failed to wait for server process: {}", e)))?;
        self.status = ServerStatus::Exited;

        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Ok(ExitObservation {
            code: status.code(),
            signal,
            lifetime: self.started_at.elapsed(),
        })
    }

    fn request_graceful_stop(&mut self) -> Result<()> {
        if self.status == ServerStatus::Exited {
            return Ok(());
        }
        self.status = ServerStatus::Stopping;

        #[cfg(unix)]
        {
            let pid = self.child.id() as libc::pid_t;
            // SAFETY: kill(2) with a PID we own and a standard signal number;
            // an already-reaped PID just yields ESRCH.
            let result = unsafe { libc::kill(pid, libc::SIGTERM) };
            if result == 0 {
                Ok(())
            } else {
                Err(Error::Process(format!(
                    "Failed to send SIGTERM to {}: {}",
                    pid,
                    std::io::Error::last_os_error()
                )))
            }
        }
        #[cfg(not(unix))]
        {
            // No console-less soft stop on Windows; terminate like the panel would
            self.kill()
        }
    }

    fn kill(&mut self) -> Result<()> {
        if self.status == ServerStatus::Exited {
            return Ok(());
        }
        self.child
            .kill()
            .map_err(|e| Error::Process(format!("Failed to kill process: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_observation_flags() {
        let clean = ExitObservation {
            code: Some(0),
            signal: None,
            lifetime: Duration::from_secs(3600),
        };
        assert!(clean.success());
        assert!(!clean.killed_by_os());

        let oom = ExitObservation {
            code: None,
            signal: Some(9),
            lifetime: Duration::from_secs(600),
        };
        assert!(!oom.success());
        assert!(oom.killed_by_os());
        assert_eq!(oom.to_string(), "signal 9");

        let wrapped = ExitObservation {
            code: Some(137),
            signal: None,
            lifetime: Duration::from_secs(1),
        };
        assert!(wrapped.killed_by_os());
    }

    #[test]
    fn test_spawn_missing_executable_is_launch_error() {
        let spec = LaunchSpec {
            program: PathBuf::from("/definitely/not/here/RustDedicated"),
            args: vec![],
            working_dir: PathBuf::from("."),
            env: vec![],
        };

        let err = ServerProcess::spawn(&spec).err().unwrap();
        assert!(matches!(err, Error::Launch(_)));
    }
}
