//! Per-OS paths and launch arguments.
//!
//! Everything here is a static lookup keyed on [`Platform`]; nothing touches
//! the filesystem or spawns processes.

use crate::config::SupervisorConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Directory under the install dir that holds DepotDownloader.
pub const DOWNLOADER_DIR: &str = "depotdownloader";

/// Operating systems a server build exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux x86_64.
    Linux,
    /// Windows x86_64.
    Windows,
}

impl Platform {
    /// Platform of the running host
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] when the host OS has no server
    /// build.
    pub fn current() -> Result<Self> {
        Self::from_os(std::env::consts::OS)
    }

    /// Resolve a platform from an OS name as reported by `std::env::consts::OS`
    pub fn from_os(os: &str) -> Result<Self> {
        match os {
            "linux" => Ok(Platform::Linux),
            "windows" => Ok(Platform::Windows),
            other => Err(Error::UnsupportedPlatform(other.to_string())),
        }
    }

    /// File name of the dedicated server executable
    pub fn server_executable_name(&self) -> &'static str {
        match self {
            Platform::Linux => "RustDedicated",
            Platform::Windows => "RustDedicated.exe",
        }
    }

    /// File name of the DepotDownloader executable
    pub fn downloader_executable_name(&self) -> &'static str {
        match self {
            Platform::Linux => "DepotDownloader",
            Platform::Windows => "DepotDownloader.exe",
        }
    }

    /// Release asset holding the DepotDownloader build for this platform
    pub fn downloader_asset(&self) -> &'static str {
        match self {
            Platform::Linux => "DepotDownloader-linux-x64.zip",
            Platform::Windows => "DepotDownloader-windows-x64.zip",
        }
    }

    /// Full path of the server executable
    pub fn server_executable(&self, install_dir: &Path) -> PathBuf {
        install_dir.join(self.server_executable_name())
    }

    /// Directory DepotDownloader is extracted into
    pub fn downloader_dir(&self, install_dir: &Path) -> PathBuf {
        install_dir.join(DOWNLOADER_DIR)
    }

    /// Full path of the DepotDownloader executable
    pub fn downloader_executable(&self, install_dir: &Path) -> PathBuf {
        self.downloader_dir(install_dir)
            .join(self.downloader_executable_name())
    }

    /// Launch arguments for one server start
    ///
    /// `seed` is the resolved seed for this launch; see [`resolve_seed`].
    pub fn launch_args(&self, config: &SupervisorConfig, seed: u32) -> Vec<String> {
        let port = config.port.to_string();
        let mut args: Vec<String> = vec![
            "-batchmode".into(),
            "-nographics".into(),
            "+server.ip".into(),
            config.bind_address.clone(),
            "+server.port".into(),
            port.clone(),
            // Single-port setup: query and RCON share the game port
            "+server.queryport".into(),
            port.clone(),
        ];

        match config.map.level_name() {
            Some(level) => {
                args.push("+server.level".into());
                args.push(level.to_string());
            }
            None => {
                args.push("+server.levelurl".into());
                args.push(config.map_url.clone());
            }
        }

        args.extend([
            "+server.seed".to_string(),
            seed.to_string(),
            "+server.worldsize".to_string(),
            config.world_size.to_string(),
            "+server.maxplayers".to_string(),
            config.max_players.to_string(),
            "+server.hostname".to_string(),
            config.hostname.clone(),
            "+server.description".to_string(),
            config.description.clone(),
            "+server.identity".to_string(),
            config.identity.clone(),
            "+rcon.port".to_string(),
            port,
            "+rcon.password".to_string(),
            config.rcon_password.clone(),
            "+rcon.web".to_string(),
            if config.rcon_web { "1" } else { "0" }.to_string(),
        ]);

        // Unity only logs to the console on Linux when told to
        if *self == Platform::Linux {
            args.push("-logfile".into());
            args.push("/dev/stdout".into());
        }

        args
    }

    /// Extra environment for the server process
    ///
    /// On Linux the server needs its native plugin directories on
    /// `LD_LIBRARY_PATH`; `existing` is the manager's current value, kept at
    /// the end.
    pub fn server_env(&self, install_dir: &Path, existing: Option<&str>) -> Vec<(String, String)> {
        match self {
            Platform::Linux => {
                let plugins = install_dir.join("RustDedicated_Data").join("Plugins");
                let mut paths = vec![
                    install_dir.display().to_string(),
                    plugins.display().to_string(),
                    plugins.join("x86_64").display().to_string(),
                ];
                if let Some(existing) = existing.filter(|value| !value.is_empty()) {
                    paths.push(existing.to_string());
                }
                vec![("LD_LIBRARY_PATH".to_string(), paths.join(":"))]
            }
            Platform::Windows => Vec::new(),
        }
    }
}

/// Seed for one launch: the configured seed, or a fresh random one when it is `0`
pub fn resolve_seed(configured: u32) -> u32 {
    use rand::Rng;

    if configured != 0 {
        return configured;
    }
    rand::thread_rng().gen_range(1..=i32::MAX as u32)
}
