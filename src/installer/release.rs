use crate::error::{Error, Result};
use serde::Deserialize;

/// GitHub repository DepotDownloader is released from.
pub const DEPOTDOWNLOADER_REPO: &str = "SteamRE/DepotDownloader";

/// Latest-release endpoint of the GitHub API for [`DEPOTDOWNLOADER_REPO`].
pub fn latest_release_url() -> String {
    format!(
        "https://api.github.com/repos/{}/releases/latest",
        DEPOTDOWNLOADER_REPO
    )
}

/// A GitHub release, reduced to the fields we read
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Release tag, e.g. `DepotDownloader_3.4.0`
    pub tag_name: String,
    /// Downloadable files
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// One downloadable file of a release
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    /// File name
    pub name: String,
    /// Direct download URL
    pub browser_download_url: String,
}

impl Release {
    /// Find the asset named `name`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Install`] when the release has no such asset.
    pub fn asset(&self, name: &str) -> Result<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name).ok_or_else(|| {
            Error::Install(format!(
                "Could not find {} in release {}",
                name, self.tag_name
            ))
        })
    }
}

/// Fetch release metadata from `url`
pub async fn fetch_release(client: &reqwest::Client, url: &str) -> Result<Release> {
    tracing::info!(%url, "Fetching latest DepotDownloader release info");
    client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| Error::Install(format!("Failed to query release API: {}", e)))?
        .json::<Release>()
        .await
        .map_err(|e| Error::Install(format!("Malformed release metadata: {}", e)))
}

/// Download an asset into memory
pub async fn download_asset(client: &reqwest::Client, asset: &ReleaseAsset) -> Result<Vec<u8>> {
    tracing::info!(url = %asset.browser_download_url, "Downloading {}", asset.name);
    let bytes = client
        .get(&asset.browser_download_url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| Error::Install(format!("Failed to download {}: {}", asset.name, e)))?
        .bytes()
        .await
        .map_err(|e| Error::Install(format!("Download of {} interrupted: {}", asset.name, e)))?;
    Ok(bytes.to_vec())
}
