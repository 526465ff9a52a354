use super::release::{self, latest_release_url};
use super::ContentInstaller;
use crate::error::{Error, Result};
use crate::platform::Platform;
use async_process::{Command, Stdio};
use async_trait::async_trait;
use futures_lite::io::{AsyncBufReadExt, BufReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Steam app ID of the Rust Dedicated Server.
pub const RUST_SERVER_APP_ID: u32 = 258550;

const USER_AGENT: &str = concat!("rds-manager/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Installs and updates the server through DepotDownloader.
///
/// DepotDownloader itself is fetched from its latest GitHub release the first
/// time; afterwards every call runs it against the server app, which is a
/// quick no-op when the install is current.
pub struct DepotInstaller {
    /// Target platform
    platform: Platform,
    /// Server install directory
    install_dir: PathBuf,
    /// Steam app to install
    app_id: u32,
    /// Release metadata endpoint
    release_url: String,
    /// HTTP client for the release API and asset download
    client: reqwest::Client,
}

impl DepotInstaller {
    /// Create an installer for the server app
    ///
    /// # Errors
    ///
    /// Returns [`Error::Install`] if the HTTP client cannot be built.
    pub fn new(platform: Platform, install_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Install(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            platform,
            install_dir: install_dir.into(),
            app_id: RUST_SERVER_APP_ID,
            release_url: latest_release_url(),
            client,
        })
    }

    /// Use a different release metadata endpoint
    pub fn with_release_url(mut self, url: impl Into<String>) -> Self {
        self.release_url = url.into();
        self
    }

    /// Path of the DepotDownloader executable
    pub fn downloader_path(&self) -> PathBuf {
        self.platform.downloader_executable(&self.install_dir)
    }

    /// Make sure DepotDownloader is installed, downloading it if missing
    #[tracing::instrument(skip(self), fields(dir = %self.install_dir.display()))]
    pub async fn ensure_downloader(&self) -> Result<()> {
        if self.downloader_path().exists() {
            tracing::debug!("DepotDownloader already installed");
            return Ok(());
        }

        let release = release::fetch_release(&self.client, &self.release_url).await?;
        let asset = release.asset(self.platform.downloader_asset())?;
        tracing::info!(tag = %release.tag_name, asset = %asset.name, "Found DepotDownloader release");
        let archive = release::download_asset(&self.client, asset).await?;

        let platform = self.platform;
        let install_dir = self.install_dir.clone();
        tokio::task::spawn_blocking(move || install_downloader_archive(&archive, platform, &install_dir))
            .await
            .map_err(|e| Error::Install(format!("Extraction task failed: {}", e)))?
    }

    /// Run DepotDownloader against the server app, relaying its output
    #[tracing::instrument(skip(self), fields(app_id = self.app_id))]
    pub async fn update_server(&self) -> Result<()> {
        std::fs::create_dir_all(&self.install_dir).map_err(|e| {
            Error::Install(format!(
                "Failed to create {}: {}",
                self.install_dir.display(),
                e
            ))
        })?;

        let downloader = self.downloader_path();
        let app_id = self.app_id.to_string();
        tracing::info!(downloader = %downloader.display(), "Checking for server updates");

        let mut child = Command::new(&downloader)
            .arg("-app")
            .arg(&app_id)
            .arg("-dir")
            .arg(&self.install_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Install(format!(
                    "Failed to run {}: {}",
                    downloader.display(),
                    e
                ))
            })?;

        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut line = Vec::new();
            // Raw bytes: progress output is not guaranteed to be UTF-8
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&line);
                        tracing::info!(target: "depotdownloader", "{}", text.trim_end());
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Stopped relaying DepotDownloader output");
                        break;
                    }
                }
            }
        }

        let status = child
            .status()
            .await
            .map_err(|e| Error::Install(format!("Failed to wait for DepotDownloader: {}", e)))?;

        if !status.success() {
            return Err(Error::Install(format!(
                "DepotDownloader failed with {}",
                status
            )));
        }

        let server = self.platform.server_executable(&self.install_dir);
        if !server.exists() {
            return Err(Error::Install(format!(
                "{} not found after update",
                server.display()
            )));
        }
        make_executable(&server)?;

        tracing::info!("Server is up to date");
        Ok(())
    }
}

#[async_trait]
impl ContentInstaller for DepotInstaller {
    async fn ensure_current(&self) -> Result<()> {
        self.ensure_downloader().await?;
        self.update_server().await
    }
}

/// Extract a DepotDownloader release archive into the install directory.
///
/// The archive is unpacked into a staging directory beside the final one and
/// only moved into place once the executable has been found, so a bad
/// download never clobbers a working install.
pub fn install_downloader_archive(
    archive: &[u8],
    platform: Platform,
    install_dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(install_dir).map_err(|e| {
        Error::Install(format!("Failed to create {}: {}", install_dir.display(), e))
    })?;

    let staging = tempfile::Builder::new()
        .prefix(".depotdownloader-")
        .tempdir_in(install_dir)
        .map_err(|e| Error::Install(format!("Failed to create staging directory: {}", e)))?;

    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| Error::Install(format!("Invalid DepotDownloader archive: {}", e)))?;
    zip.extract(staging.path())
        .map_err(|e| Error::Install(format!("Failed to extract DepotDownloader: {}", e)))?;

    let exe_name = platform.downloader_executable_name();
    let expected = staging.path().join(exe_name);
    if !expected.exists() {
        // Some releases nest the binary one level down
        let nested = find_file(staging.path(), exe_name).ok_or_else(|| {
            Error::Install(format!("{} not found in release archive", exe_name))
        })?;
        std::fs::rename(&nested, &expected)
            .map_err(|e| Error::Install(format!("Failed to move {}: {}", exe_name, e)))?;
    }

    if platform == Platform::Linux {
        mark_extensionless_executable(staging.path())?;
    }

    let target = platform.downloader_dir(install_dir);
    if target.exists() {
        std::fs::remove_dir_all(&target).map_err(|e| {
            Error::Install(format!("Failed to replace {}: {}", target.display(), e))
        })?;
    }
    // Dropping `staging` afterwards is a no-op since its path has moved
    std::fs::rename(staging.path(), &target).map_err(|e| {
        Error::Install(format!("Failed to move DepotDownloader into place: {}", e))
    })?;

    tracing::info!(dir = %target.display(), "Extracted DepotDownloader");
    Ok(())
}

fn find_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_file(&path, name) {
                return Some(found);
            }
        } else if path.file_name().is_some_and(|n| n == name) {
            return Some(path);
        }
    }
    None
}

fn mark_extensionless_executable(dir: &Path) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::Install(format!("Failed to read {}: {}", dir.display(), e)))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && path.extension().is_none() {
            make_executable(&path)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
        Error::Install(format!("Failed to chmod {}: {}", path.display(), e))
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
