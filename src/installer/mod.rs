//! Installing and updating the server files.
//!
//! The supervisor only sees the [`ContentInstaller`] trait; [`DepotInstaller`]
//! is the production implementation backed by DepotDownloader.
mod depot;
pub mod release;

pub use depot::{install_downloader_archive, DepotInstaller, RUST_SERVER_APP_ID};

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;

/// Brings the installed server up to date.
///
/// Called before the first launch and before every restart, so it must be a
/// cheap no-op when nothing changed. On failure the previously installed
/// files must still be runnable.
#[async_trait]
pub trait ContentInstaller: Send + Sync {
    /// Install or update the downloader and the server files.
    async fn ensure_current(&self) -> Result<()>;
}

/// One-shot checks run before the supervisor starts.
///
/// Creates the install directory and confirms it is writable.
///
/// # Errors
///
/// Returns [`Error::Install`] if the directory cannot be created or written.
pub fn preflight(install_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(install_dir).map_err(|e| {
        Error::Install(format!("Failed to create {}: {}", install_dir.display(), e))
    })?;

    tempfile::tempfile_in(install_dir).map_err(|e| {
        Error::Install(format!(
            "Install directory {} is not writable: {}",
            install_dir.display(),
            e
        ))
    })?;

    tracing::debug!(dir = %install_dir.display(), "Preflight checks passed");
    Ok(())
}
