/// Server process management for the manager.
///
/// This module handles launching the dedicated server, observing its exit, and
/// the restart bookkeeping that turns exits into restart decisions.
///
/// # Components
///
/// * `lifecycle` - Supervisor states and the event history
/// * `monitor` - Fast-crash classification and restart decisions
/// * `process` - Launching and signalling the server process
///
/// # Examples
///
/// Deciding whether to restart after an exit:
///
/// ```
/// use rds_manager::server::{CrashTracker, ExitObservation, RestartDecision, RestartPolicy};
/// use std::time::Duration;
///
/// let mut tracker = CrashTracker::new(RestartPolicy::default());
/// let exit = ExitObservation {
///     code: Some(0),
///     signal: None,
///     lifetime: Duration::from_secs(3600),
/// };
///
/// assert_eq!(tracker.observe(&exit), RestartDecision::Restart { fast_crash: false });
/// ```
pub mod lifecycle;
pub mod monitor;
mod process;

pub use lifecycle::{LifecycleEvent, LifecycleLog, SupervisorEvent, SupervisorState};
pub use monitor::{
    CrashTracker, FAST_CRASH_WINDOW, GiveUpReason, RestartDecision, RestartPolicy,
};
pub use process::{
    ExitObservation, LaunchId, LaunchSpec, ManagedProcess, ProcessLauncher, ServerLauncher,
    ServerProcess, ServerStatus,
};
