use crate::error::{Error, Result};
use crate::server::LaunchId;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Maximum number of events kept in the history
const MAX_EVENTS: usize = 1000;

/// Phase of the supervisor state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Installing or updating the downloader and server files
    Installing,
    /// Writing server.cfg
    Configuring,
    /// Starting the server process
    Launching,
    /// Server process is running
    Running,
    /// Server process has exited, deciding what to do next
    Exited,
    /// Supervision has ended
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Installing => "installing",
            SupervisorState::Configuring => "configuring",
            SupervisorState::Launching => "launching",
            SupervisorState::Running => "running",
            SupervisorState::Exited => "exited",
            SupervisorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Supervisor lifecycle event types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// State machine moved to a new phase
    Transition(SupervisorState),
    /// Install, config or launch failed; the cycle will be retried
    SetupFailed(SupervisorState),
    /// Server process started
    Launched,
    /// Server process exited
    Exited,
    /// The exit was classified as a fast crash
    FastCrash,
    /// Graceful stop was sent to the server
    StopRequested,
    /// Server did not stop in time and was killed
    Killed,
}

/// One recorded lifecycle event
#[derive(Debug, Clone)]
pub struct SupervisorEvent {
    /// Launch the event belongs to, if any
    pub launch_id: Option<LaunchId>,
    /// Event type
    pub event: LifecycleEvent,
    /// Event timestamp
    pub timestamp: Instant,
    /// Event details
    pub details: Option<String>,
}

/// Bounded history of supervisor events plus the current state.
///
/// Cloning shares the same history, so callers can keep a handle while the
/// supervisor records into it.
#[derive(Debug, Clone)]
pub struct LifecycleLog {
    /// Recorded events, oldest first
    events: Arc<Mutex<VecDeque<SupervisorEvent>>>,
    /// Current state
    state: Arc<Mutex<SupervisorState>>,
}

impl LifecycleLog {
    /// Create an empty log in the `Installing` state
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            state: Arc::new(Mutex::new(SupervisorState::Installing)),
        }
    }

    /// Move to `state` and record the transition
    pub fn transition(&self, state: SupervisorState) -> Result<()> {
        {
            let mut current = self
                .state
                .lock()
                .map_err(|_| Error::Other("Failed to lock supervisor state".to_string()))?;
            *current = state;
        }
        tracing::debug!(%state, "Supervisor state changed");
        self.record_event(None, LifecycleEvent::Transition(state), None)
    }

    /// Record an event
    pub fn record_event(
        &self,
        launch_id: Option<LaunchId>,
        event: LifecycleEvent,
        details: Option<String>,
    ) -> Result<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| Error::Other("Failed to lock lifecycle events".to_string()))?;

        events.push_back(SupervisorEvent {
            launch_id,
            event,
            timestamp: Instant::now(),
            details,
        });

        // Limit event history
        if events.len() > MAX_EVENTS {
            events.pop_front();
        }

        Ok(())
    }

    /// Current supervisor state
    pub fn state(&self) -> Result<SupervisorState> {
        self.state
            .lock()
            .map(|state| *state)
            .map_err(|_| Error::Other("Failed to lock supervisor state".to_string()))
    }

    /// All events, oldest first
    pub fn events(&self) -> Result<Vec<SupervisorEvent>> {
        let events = self
            .events
            .lock()
            .map_err(|_| Error::Other("Failed to lock lifecycle events".to_string()))?;
        Ok(events.iter().cloned().collect())
    }

    /// Number of recorded events of the given type
    pub fn count(&self, event: LifecycleEvent) -> Result<usize> {
        let events = self
            .events
            .lock()
            .map_err(|_| Error::Other("Failed to lock lifecycle events".to_string()))?;
        Ok(events.iter().filter(|e| e.event == event).count())
    }

    /// The sequence of states visited, oldest first
    pub fn transitions(&self) -> Result<Vec<SupervisorState>> {
        Ok(self
            .events()?
            .into_iter()
            .filter_map(|e| match e.event {
                LifecycleEvent::Transition(state) => Some(state),
                _ => None,
            })
            .collect())
    }
}

impl Default for LifecycleLog {
    fn default() -> Self {
        Self::new()
    }
}
