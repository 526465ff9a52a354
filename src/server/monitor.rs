use crate::config::SupervisorConfig;
use crate::error::Error;
use crate::server::ExitObservation;
use std::time::Duration;

/// Exits sooner than this after launch count as fast crashes.
pub const FAST_CRASH_WINDOW: Duration = Duration::from_secs(60);

/// Restart policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Lifetime below which an exit is a fast crash
    pub fast_crash_window: Duration,
    /// Consecutive fast crashes before giving up
    pub max_fast_crashes: u32,
    /// Consecutive non-zero exits before giving up, if limited
    pub max_consecutive_failures: Option<u32>,
    /// Wait before every restart or retry
    pub restart_delay: Duration,
}

impl RestartPolicy {
    /// Build the policy from the run configuration
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self {
            fast_crash_window: FAST_CRASH_WINDOW,
            max_fast_crashes: config.max_fast_crashes.max(1),
            max_consecutive_failures: config.max_consecutive_failures,
            restart_delay: Duration::from_secs(config.restart_delay_secs),
        }
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::from_config(&SupervisorConfig::default())
    }
}

/// Why supervision gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    /// Too many consecutive fast crashes
    CrashLoop {
        /// Fast crashes in a row
        crashes: u32,
    },
    /// Too many consecutive non-zero exits
    TooManyFailures {
        /// Failed exits in a row
        failures: u32,
    },
}

impl From<GiveUpReason> for Error {
    fn from(reason: GiveUpReason) -> Self {
        match reason {
            GiveUpReason::CrashLoop { crashes } => Error::CrashLoop { crashes },
            GiveUpReason::TooManyFailures { failures } => Error::TooManyFailures { failures },
        }
    }
}

/// Outcome of feeding one exit into the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Restart after the delay
    Restart {
        /// Whether this exit was a fast crash
        fast_crash: bool,
    },
    /// Stop supervising
    GiveUp(GiveUpReason),
}

/// Consecutive-crash bookkeeping for one supervisor run
#[derive(Debug, Clone)]
pub struct CrashTracker {
    /// Policy in effect
    policy: RestartPolicy,
    /// Fast crashes in a row
    consecutive_fast_crashes: u32,
    /// Non-zero exits in a row
    consecutive_failures: u32,
}

impl CrashTracker {
    /// Create a tracker with zeroed counters
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            consecutive_fast_crashes: 0,
            consecutive_failures: 0,
        }
    }

    /// Policy in effect
    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    /// Fast crashes in a row so far
    pub fn consecutive_fast_crashes(&self) -> u32 {
        self.consecutive_fast_crashes
    }

    /// Non-zero exits in a row so far
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether `exit` counts as a fast crash
    pub fn is_fast_crash(&self, exit: &ExitObservation) -> bool {
        exit.lifetime < self.policy.fast_crash_window
    }

    /// Record one server exit and decide what happens next
    pub fn observe(&mut self, exit: &ExitObservation) -> RestartDecision {
        let fast_crash = self.is_fast_crash(exit);

        if fast_crash {
            self.consecutive_fast_crashes += 1;
            tracing::warn!(
                crashes = self.consecutive_fast_crashes,
                max = self.policy.max_fast_crashes,
                lifetime_secs = exit.lifetime.as_secs(),
                "Fast crash detected ({}/{})",
                self.consecutive_fast_crashes,
                self.policy.max_fast_crashes
            );
            if self.consecutive_fast_crashes >= self.policy.max_fast_crashes {
                return RestartDecision::GiveUp(GiveUpReason::CrashLoop {
                    crashes: self.consecutive_fast_crashes,
                });
            }
        } else {
            // A server that ran for a while is not stuck in a boot loop
            self.consecutive_fast_crashes = 0;
        }

        if exit.success() {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
            if let Some(max) = self.policy.max_consecutive_failures {
                tracing::warn!(
                    failures = self.consecutive_failures,
                    max,
                    "Consecutive failed exit #{}/{}",
                    self.consecutive_failures,
                    max
                );
                if self.consecutive_failures >= max {
                    return RestartDecision::GiveUp(GiveUpReason::TooManyFailures {
                        failures: self.consecutive_failures,
                    });
                }
            }
        }

        RestartDecision::Restart { fast_crash }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exit_after(secs: u64, code: i32) -> ExitObservation {
        ExitObservation {
            code: Some(code),
            signal: None,
            lifetime: Duration::from_secs(secs),
        }
    }

    fn policy(max_fast_crashes: u32) -> RestartPolicy {
        RestartPolicy {
            max_fast_crashes,
            ..RestartPolicy::default()
        }
    }

    #[test]
    fn test_gives_up_exactly_at_threshold() {
        let mut tracker = CrashTracker::new(policy(5));

        for _ in 0..4 {
            assert_eq!(
                tracker.observe(&exit_after(2, 1)),
                RestartDecision::Restart { fast_crash: true }
            );
        }
        assert_eq!(
            tracker.observe(&exit_after(2, 1)),
            RestartDecision::GiveUp(GiveUpReason::CrashLoop { crashes: 5 })
        );
    }

    #[test]
    fn test_slow_exit_resets_fast_crash_counter() {
        let mut tracker = CrashTracker::new(policy(5));

        tracker.observe(&exit_after(1, 1));
        tracker.observe(&exit_after(1, 1));
        assert_eq!(tracker.consecutive_fast_crashes(), 2);

        assert_eq!(
            tracker.observe(&exit_after(3600, 1)),
            RestartDecision::Restart { fast_crash: false }
        );
        assert_eq!(tracker.consecutive_fast_crashes(), 0);

        tracker.observe(&exit_after(1, 1));
        assert_eq!(
            tracker.observe(&exit_after(1, 1)),
            RestartDecision::Restart { fast_crash: true }
        );
    }

    #[test]
    fn test_window_boundary_is_not_fast() {
        let tracker = CrashTracker::new(RestartPolicy::default());
        assert!(tracker.is_fast_crash(&exit_after(59, 0)));
        assert!(!tracker.is_fast_crash(&exit_after(60, 0)));
    }

    #[test]
    fn test_slow_failures_unlimited_by_default() {
        let mut tracker = CrashTracker::new(RestartPolicy::default());
        for _ in 0..50 {
            assert_eq!(
                tracker.observe(&exit_after(7200, 1)),
                RestartDecision::Restart { fast_crash: false }
            );
        }
        assert_eq!(tracker.consecutive_failures(), 50);
    }

    #[test]
    fn test_consecutive_failure_limit() {
        let mut tracker = CrashTracker::new(RestartPolicy {
            max_consecutive_failures: Some(3),
            ..RestartPolicy::default()
        });

        tracker.observe(&exit_after(7200, 1));
        tracker.observe(&exit_after(7200, 0));
        assert_eq!(tracker.consecutive_failures(), 0);

        tracker.observe(&exit_after(7200, 1));
        tracker.observe(&exit_after(7200, 1));
        assert_eq!(
            tracker.observe(&exit_after(7200, 137)),
            RestartDecision::GiveUp(GiveUpReason::TooManyFailures { failures: 3 })
        );
    }
}
