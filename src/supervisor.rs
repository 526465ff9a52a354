//! The supervision loop.
//!
//! [`Supervisor`] drives one server through install → configure → launch →
//! wait → decide, forever, until either the operator asks it to stop or the
//! server crash-loops.

use crate::config::{ConfigWriter, SupervisorConfig};
use crate::error::{Error, Result};
use crate::installer::ContentInstaller;
use crate::platform::{resolve_seed, Platform};
use crate::server::{
    CrashTracker, ExitObservation, LaunchId, LaunchSpec, LifecycleEvent, LifecycleLog,
    ManagedProcess, ProcessLauncher, RestartDecision, RestartPolicy, SupervisorState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// How long a server gets to exit after a graceful stop before it is killed.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Requests a deliberate shutdown of the manager.
///
/// Cheap to clone; typically handed to the signal-handling task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Ask the supervisor to stop the server and exit
    pub fn request(&self) {
        self.tx.send_replace(true);
    }

    /// Whether shutdown has been requested
    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving side of the shutdown channel, owned by the supervisor.
#[derive(Debug)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested; never resolves if every handle
    /// was dropped without requesting it.
    async fn requested(&mut self) {
        if self.rx.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Create a connected shutdown handle and signal
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (
        ShutdownHandle { tx: Arc::new(tx) },
        ShutdownSignal { rx },
    )
}

/// Snapshot of the supervisor's mutable run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunState {
    /// Fast crashes in a row
    pub consecutive_fast_crashes: u32,
    /// Non-zero exits in a row
    pub consecutive_failures: u32,
    /// Whether an external shutdown was received
    pub shutdown_requested: bool,
    /// Whether a server process is currently live
    pub process_running: bool,
    /// Number of successful launches so far
    pub launches: u32,
}

/// How a single cycle ended
enum CycleEnd {
    /// The server exited
    Exited(ExitObservation),
    /// Shutdown arrived before the server was launched
    ShutdownBeforeLaunch,
}

/// Supervises one dedicated server.
///
/// The supervisor owns all run state; the only shared piece is the shutdown
/// channel. At most one server process is live at any time.
pub struct Supervisor<I, L> {
    /// Run configuration
    config: SupervisorConfig,
    /// Target platform
    platform: Platform,
    /// Keeps the server files current
    installer: I,
    /// Starts server processes
    launcher: L,
    /// Writes server.cfg
    writer: ConfigWriter,
    /// Restart bookkeeping
    tracker: CrashTracker,
    /// Event history
    log: LifecycleLog,
    /// Current phase
    state: SupervisorState,
    /// Shutdown notifications
    shutdown: ShutdownSignal,
    /// Set once shutdown was observed
    shutdown_requested: bool,
    /// The live server, if any
    process: Option<Box<dyn ManagedProcess>>,
    /// Successful launches
    launches: u32,
    /// Graceful stop deadline
    shutdown_timeout: Duration,
}

impl<I, L> Supervisor<I, L>
where
    I: ContentInstaller,
    L: ProcessLauncher,
{
    /// Create a supervisor for `config`
    #[tracing::instrument(skip_all, fields(identity = %config.identity))]
    pub fn new(
        config: SupervisorConfig,
        platform: Platform,
        installer: I,
        launcher: L,
        shutdown: ShutdownSignal,
    ) -> Self {
        tracing::info!(?platform, "Creating new Supervisor");
        Self {
            writer: ConfigWriter::new(&config.install_dir),
            tracker: CrashTracker::new(RestartPolicy::from_config(&config)),
            config,
            platform,
            installer,
            launcher,
            log: LifecycleLog::new(),
            state: SupervisorState::Installing,
            shutdown,
            shutdown_requested: false,
            process: None,
            launches: 0,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        }
    }

    /// Override how long a graceful stop may take before the server is killed
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Handle to the event history
    pub fn lifecycle(&self) -> LifecycleLog {
        self.log.clone()
    }

    /// Current phase
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Snapshot of the run state
    pub fn run_state(&self) -> RunState {
        RunState {
            consecutive_fast_crashes: self.tracker.consecutive_fast_crashes(),
            consecutive_failures: self.tracker.consecutive_failures(),
            shutdown_requested: self.shutdown_requested,
            process_running: self.process.is_some(),
            launches: self.launches,
        }
    }

    /// Run until shutdown or crash-loop.
    ///
    /// Returns `Ok(())` after a deliberate shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CrashLoop`] (or [`Error::TooManyFailures`] when that
    /// limit is configured) when the server keeps dying. Install, config and
    /// launch failures never end the loop; they are retried after the
    /// restart delay.
    #[tracing::instrument(skip(self), fields(identity = %self.config.identity))]
    pub async fn run(&mut self) -> Result<()> {
        let delay = self.tracker.policy().restart_delay;
        tracing::info!(
            restart_delay_secs = delay.as_secs(),
            max_fast_crashes = self.tracker.policy().max_fast_crashes,
            "Supervisor started"
        );

        loop {
            if self.poll_shutdown() {
                return self.finish_shutdown();
            }

            match self.run_cycle().await {
                Ok(CycleEnd::ShutdownBeforeLaunch) => return self.finish_shutdown(),
                Ok(CycleEnd::Exited(exit)) => {
                    if self.poll_shutdown() {
                        return self.finish_shutdown();
                    }

                    if self.tracker.is_fast_crash(&exit) {
                        self.record(None, LifecycleEvent::FastCrash, Some(exit.to_string()));
                    }

                    match self.tracker.observe(&exit) {
                        RestartDecision::GiveUp(reason) => {
                            let error = Error::from(reason);
                            self.enter(SupervisorState::Stopped);
                            tracing::error!(error = %error, "Check the server log for errors");
                            return Err(error);
                        }
                        RestartDecision::Restart { .. } => {
                            tracing::info!(
                                "Restarting in {}s, checking for updates first",
                                delay.as_secs()
                            );
                        }
                    }
                }
                Err(e) if e.is_recoverable() => {
                    let phase = self.state;
                    tracing::error!(%phase, error = %e, "Cycle failed, retrying in {}s", delay.as_secs());
                    self.record(None, LifecycleEvent::SetupFailed(phase), Some(e.to_string()));
                }
                Err(e) => {
                    self.enter(SupervisorState::Stopped);
                    return Err(e);
                }
            }

            if !self.sleep_unless_shutdown(delay).await {
                return self.finish_shutdown();
            }
        }
    }

    /// One pass through install → configure → launch → wait
    async fn run_cycle(&mut self) -> Result<CycleEnd> {
        self.enter(SupervisorState::Installing);
        // Dropping the install future cancels it; the installer reaps its children
        let installed = tokio::select! {
            result = self.installer.ensure_current() => Some(result),
            _ = self.shutdown.requested() => None,
        };
        match installed {
            Some(result) => result?,
            None => {
                self.shutdown_requested = true;
                tracing::info!("Shutdown requested, abandoning install");
                return Ok(CycleEnd::ShutdownBeforeLaunch);
            }
        }

        self.enter(SupervisorState::Configuring);
        self.writer.write(&self.config)?;

        // Shutdown during config: don't start a server just to stop it
        if self.poll_shutdown() {
            return Ok(CycleEnd::ShutdownBeforeLaunch);
        }

        self.enter(SupervisorState::Launching);
        let spec = self.launch_spec();
        let process = self.launcher.launch(&spec).await?;
        let launch_id = process.id();
        self.launches += 1;
        tracing::info!(
            %launch_id,
            pid = ?process.pid(),
            launch = self.launches,
            "Server launched"
        );
        self.record(Some(launch_id), LifecycleEvent::Launched, None);
        self.process = Some(process);
        self.enter(SupervisorState::Running);

        let result = self.wait_for_exit(launch_id).await;
        self.process = None;
        let exit = result?;

        self.enter(SupervisorState::Exited);
        self.report_exit(launch_id, &exit);
        Ok(CycleEnd::Exited(exit))
    }

    /// Block until the live server exits, stopping it if shutdown arrives
    async fn wait_for_exit(&mut self, launch_id: LaunchId) -> Result<ExitObservation> {
        let exited = {
            let process = self
                .process
                .as_mut()
                .ok_or_else(|| Error::Process("No server process to wait on".to_string()))?;

            tokio::select! {
                exit = process.wait() => Some(exit),
                _ = self.shutdown.requested() => None,
            }
        };

        let exit = match exited {
            Some(exit) => exit,
            None => self.stop_server(launch_id).await,
        };

        if exit.is_err() {
            // Never leave a server we lost track of running behind a new one
            if let Some(process) = self.process.as_mut() {
                if let Err(e) = process.kill() {
                    tracing::warn!(error = %e, "Failed to kill server after wait error");
                }
            }
        }
        exit
    }

    /// Graceful stop, then kill once the shutdown timeout passes
    async fn stop_server(&mut self, launch_id: LaunchId) -> Result<ExitObservation> {
        self.shutdown_requested = true;
        tracing::info!(%launch_id, "Shutdown requested, stopping server");
        self.record(Some(launch_id), LifecycleEvent::StopRequested, None);

        let log = self.log.clone();
        let timeout = self.shutdown_timeout;
        let process = self
            .process
            .as_mut()
            .ok_or_else(|| Error::Process("No server process to stop".to_string()))?;

        if let Err(e) = process.request_graceful_stop() {
            tracing::warn!(error = %e, "Graceful stop failed");
        }

        match tokio::time::timeout(timeout, process.wait()).await {
            Ok(exit) => exit,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    "Server did not stop in time, killing it"
                );
                if let Err(e) = log.record_event(Some(launch_id), LifecycleEvent::Killed, None) {
                    tracing::warn!(error = %e, "Failed to record lifecycle event");
                }
                process.kill()?;
                process.wait().await
            }
        }
    }

    /// Build the launch spec for the next start
    fn launch_spec(&self) -> LaunchSpec {
        let install_dir = &self.config.install_dir;
        let seed = resolve_seed(self.config.seed);
        let existing = std::env::var("LD_LIBRARY_PATH").ok();

        tracing::info!(
            port = self.config.port,
            map = %self.config.map,
            world_size = self.config.world_size,
            seed,
            "Launching server"
        );

        LaunchSpec {
            program: self.platform.server_executable(install_dir),
            args: self.platform.launch_args(&self.config, seed),
            working_dir: install_dir.clone(),
            env: self.platform.server_env(install_dir, existing.as_deref()),
        }
    }

    fn report_exit(&self, launch_id: LaunchId, exit: &ExitObservation) {
        tracing::info!(
            %launch_id,
            code = ?exit.code,
            signal = ?exit.signal,
            ran_secs = exit.lifetime.as_secs(),
            "Server exited with {} (ran {}s)",
            exit,
            exit.lifetime.as_secs()
        );
        self.record(Some(launch_id), LifecycleEvent::Exited, Some(exit.to_string()));

        if exit.killed_by_os() {
            tracing::warn!(
                world_size = self.config.world_size,
                "Server was killed (SIGKILL), usually the OS ran out of memory; \
                 try a smaller world size (e.g. 2500-3000) or add RAM to the host"
            );
        }
    }

    /// Sleep for `delay`; false if shutdown arrived first
    async fn sleep_unless_shutdown(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.shutdown.requested() => {
                self.shutdown_requested = true;
                false
            }
        }
    }

    fn poll_shutdown(&mut self) -> bool {
        if self.shutdown.is_requested() {
            self.shutdown_requested = true;
        }
        self.shutdown_requested
    }

    fn finish_shutdown(&mut self) -> Result<()> {
        self.enter(SupervisorState::Stopped);
        tracing::info!("Server manager stopped");
        Ok(())
    }

    fn enter(&mut self, state: SupervisorState) {
        self.state = state;
        if let Err(e) = self.log.transition(state) {
            tracing::warn!(error = %e, "Failed to record state transition");
        }
    }

    fn record(&self, launch_id: Option<LaunchId>, event: LifecycleEvent, details: Option<String>) {
        if let Err(e) = self.log.record_event(launch_id, event, details) {
            tracing::warn!(error = %e, "Failed to record lifecycle event");
        }
    }
}
