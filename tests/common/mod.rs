#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use rds_manager::error::{Error, Result};
use rds_manager::installer::ContentInstaller;
use rds_manager::server::{ExitObservation, LaunchId, LaunchSpec, ManagedProcess, ProcessLauncher};
use rds_manager::SupervisorConfig;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

// Define a mock for the ContentInstaller trait
mock! {
    pub Installer {}

    #[async_trait]
    impl ContentInstaller for Installer {
        async fn ensure_current(&self) -> Result<()>;
    }
}

/// Installer that always reports the server as current
pub fn always_current() -> MockInstaller {
    let mut installer = MockInstaller::new();
    installer.expect_ensure_current().returning(|| Ok(()));
    installer
}

/// Config rooted in a temp dir with the given restart settings
pub fn test_config(install_dir: &Path, restart_delay_secs: u64, max_fast_crashes: u32) -> SupervisorConfig {
    SupervisorConfig {
        install_dir: install_dir.to_path_buf(),
        restart_delay_secs,
        max_fast_crashes,
        rcon_password: "test-password".to_string(),
        ..SupervisorConfig::default()
    }
}

/// What the next launched fake server does
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    /// Run for `lifetime`, then exit with `code`
    Exit { lifetime: Duration, code: i32 },
    /// Run until asked to stop
    Hang,
    /// Run until killed, ignoring graceful stop requests
    HangIgnoringStop,
    /// Run until asked to stop, then exit with `code`
    ExitOnStop { code: i32 },
    /// Fail to launch
    FailLaunch,
}

impl Outcome {
    /// Exit immediately with a failure code
    pub fn crash() -> Self {
        Outcome::Exit {
            lifetime: Duration::ZERO,
            code: 1,
        }
    }

    /// Exit after `secs` seconds with `code`
    pub fn exit_after(secs: u64, code: i32) -> Self {
        Outcome::Exit {
            lifetime: Duration::from_secs(secs),
            code,
        }
    }
}

/// Counters shared between a fake launcher, its processes and the test
#[derive(Debug, Default)]
pub struct LaunchStats {
    attempts: AtomicUsize,
    live: AtomicUsize,
    graceful_stops: AtomicUsize,
    kills: AtomicUsize,
    launch_times: Mutex<Vec<Instant>>,
    specs: Mutex<Vec<LaunchSpec>>,
}

impl LaunchStats {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn launches(&self) -> usize {
        self.launch_times.lock().unwrap().len()
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn graceful_stops(&self) -> usize {
        self.graceful_stops.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn launch_times(&self) -> Vec<Instant> {
        self.launch_times.lock().unwrap().clone()
    }

    pub fn specs(&self) -> Vec<LaunchSpec> {
        self.specs.lock().unwrap().clone()
    }

    /// Gaps between consecutive launches
    pub fn launch_gaps(&self) -> Vec<Duration> {
        self.launch_times()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }
}

/// Installer whose every update takes `duration`
pub struct SlowInstaller {
    pub duration: Duration,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ContentInstaller for SlowInstaller {
    async fn ensure_current(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}

/// Launcher that hands out scripted fake servers.
///
/// Once the script runs out every further launch hangs until stopped.
pub struct FakeLauncher {
    script: Mutex<VecDeque<Outcome>>,
    stats: Arc<LaunchStats>,
}

impl FakeLauncher {
    pub fn new(script: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            stats: Arc::new(LaunchStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<LaunchStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn ManagedProcess>> {
        self.stats.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Hang);

        if let Outcome::FailLaunch = outcome {
            return Err(Error::Launch(format!(
                "Executable not found: {}",
                spec.program.display()
            )));
        }

        let previously_live = self.stats.live.fetch_add(1, Ordering::SeqCst);
        assert_eq!(previously_live, 0, "launched while another server was live");

        self.stats.launch_times.lock().unwrap().push(Instant::now());
        self.stats.specs.lock().unwrap().push(spec.clone());

        Ok(Box::new(FakeProcess {
            id: LaunchId::new(),
            outcome,
            started: Instant::now(),
            stop_requested: false,
            killed: false,
            exited: false,
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct FakeProcess {
    id: LaunchId,
    outcome: Outcome,
    started: Instant,
    stop_requested: bool,
    killed: bool,
    exited: bool,
    stats: Arc<LaunchStats>,
}

impl FakeProcess {
    fn finish(&mut self, code: Option<i32>, signal: Option<i32>) -> ExitObservation {
        if !self.exited {
            self.exited = true;
            self.stats.live.fetch_sub(1, Ordering::SeqCst);
        }
        ExitObservation {
            code,
            signal,
            lifetime: self.started.elapsed(),
        }
    }
}

#[async_trait]
impl ManagedProcess for FakeProcess {
    fn id(&self) -> LaunchId {
        self.id
    }

    fn pid(&self) -> Option<u32> {
        None
    }

    async fn wait(&mut self) -> Result<ExitObservation> {
        if self.killed {
            return Ok(self.finish(None, Some(9)));
        }

        if self.stop_requested {
            match self.outcome {
                Outcome::HangIgnoringStop => {}
                Outcome::ExitOnStop { code } => return Ok(self.finish(Some(code), None)),
                _ => return Ok(self.finish(None, Some(15))),
            }
        }

        match self.outcome {
            Outcome::Exit { lifetime, code } => {
                tokio::time::sleep_until(self.started + lifetime).await;
                Ok(self.finish(Some(code), None))
            }
            _ => std::future::pending().await,
        }
    }

    fn request_graceful_stop(&mut self) -> Result<()> {
        self.stats.graceful_stops.fetch_add(1, Ordering::SeqCst);
        self.stop_requested = true;
        Ok(())
    }

    fn kill(&mut self) -> Result<()> {
        if !self.exited {
            self.stats.kills.fetch_add(1, Ordering::SeqCst);
            self.killed = true;
        }
        Ok(())
    }
}
