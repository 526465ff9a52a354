/*!
 # rds-manager

 A Rust library and binary that keeps a Rust Dedicated Server alive without
 an operator watching it.

 ## Overview

 rds-manager provides functionality to:
 - Install and update the server through DepotDownloader
 - Render the server's `server.cfg` from typed settings
 - Launch the server with per-platform arguments and environment
 - Restart it after it exits, checking for updates first
 - Give up when the server crash-loops instead of retrying forever
 - Stop the server gracefully when the manager itself is asked to stop

 ## Basic Usage

 ```no_run
 use rds_manager::{
     DepotInstaller, Platform, ServerLauncher, Supervisor, SupervisorConfig, shutdown_channel,
 };

 #[tokio::main]
 async fn main() -> rds_manager::Result<()> {
     let config = SupervisorConfig::from_file("manager.json")?;
     let platform = Platform::current()?;
     let installer = DepotInstaller::new(platform, &config.install_dir)?;

     let (handle, signal) = shutdown_channel();
     tokio::spawn(async move {
         let _ = tokio::signal::ctrl_c().await;
         handle.request();
     });

     let mut supervisor = Supervisor::new(config, platform, installer, ServerLauncher, signal);
     supervisor.run().await
 }
 ```

 ## Restart policy

 - Every exit is followed by the restart delay, an update check and a fresh
   `server.cfg`.
 - An exit less than a minute after launch is a fast crash; enough of them in
   a row stop the manager with [`Error::CrashLoop`].
 - Any exit after a longer run resets the fast-crash count.
 - Install, config and launch failures are retried after the delay and never
   count as crashes.

 ## License

 This project is licensed under the terms in the LICENSE file.
*/

pub mod config;
pub mod error;
pub mod installer;
pub mod platform;
pub mod server;
pub mod supervisor;

pub use config::{validate_config, ConfigWriter, MapType, SupervisorConfig};
pub use error::{Error, Result};
pub use installer::{preflight, ContentInstaller, DepotInstaller};
pub use platform::Platform;
pub use server::{
    ExitObservation, LaunchId, LaunchSpec, ManagedProcess, ProcessLauncher, ServerLauncher,
    SupervisorState,
};
pub use supervisor::{shutdown_channel, RunState, ShutdownHandle, ShutdownSignal, Supervisor};
