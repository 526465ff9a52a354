use crate::config::SupervisorConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Autosave interval written into every generated config, in seconds.
pub const SAVE_INTERVAL_SECS: u32 = 300;

/// Renders and writes the `server.cfg` the server reads at startup.
///
/// The file lives at `<install_dir>/server/<identity>/cfg/server.cfg` and is
/// rewritten before every launch, even when nothing changed.
#[derive(Debug, Clone)]
pub struct ConfigWriter {
    install_dir: PathBuf,
}

impl ConfigWriter {
    /// Create a writer rooted at the server install directory
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    /// Path of the config file for the given identity
    pub fn cfg_path(&self, identity: &str) -> PathBuf {
        self.install_dir
            .join("server")
            .join(identity)
            .join("cfg")
            .join("server.cfg")
    }

    /// Render the config file contents
    pub fn render(config: &SupervisorConfig) -> String {
        format!(
            "# Auto-generated server.cfg\n\
             server.hostname \"{hostname}\"\n\
             server.description \"{description}\"\n\
             server.url \"{url}\"\n\
             server.headerimage \"{banner}\"\n\
             server.maxplayers {max_players}\n\
             server.worldsize {world_size}\n\
             server.saveinterval {SAVE_INTERVAL_SECS}\n\
             server.globalchat true\n\
             server.stability true\n",
            hostname = escape(&config.hostname),
            description = escape(&config.description),
            url = escape(&config.url),
            banner = escape(&config.banner_url),
            max_players = config.max_players,
            world_size = config.world_size,
        )
    }

    /// Render and write the config file, returning its path
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigWrite`] if the cfg directory cannot be created
    /// or the file cannot be written.
    #[tracing::instrument(skip(self, config), fields(identity = %config.identity))]
    pub fn write(&self, config: &SupervisorConfig) -> Result<PathBuf> {
        let path = self.cfg_path(&config.identity);
        let dir = path.parent().unwrap_or(Path::new("."));

        std::fs::create_dir_all(dir).map_err(|e| {
            Error::ConfigWrite(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        std::fs::write(&path, Self::render(config)).map_err(|e| {
            Error::ConfigWrite(format!("Failed to write {}: {}", path.display(), e))
        })?;

        tracing::info!(path = %path.display(), "Wrote server config");
        Ok(path)
    }
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\r', "")
        .replace('\n', "\\n")
}
