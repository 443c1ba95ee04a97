//! GitHub release API interaction

use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

use super::platform::Platform;
use crate::config::InstallerConfig;
use crate::install::InstallerError;

/// GitHub release metadata from API
#[derive(Deserialize, Debug, Clone)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

/// GitHub release asset metadata
#[derive(Deserialize, Debug, Clone)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// The asset chosen for this host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub platform: Platform,
    pub filename: &'static str,
    pub download_url: String,
    pub size: u64,
    pub tag: String,
}

/// Queries the "latest release" endpoint of the configured repository
pub struct ReleaseResolver {
    client: reqwest::Client,
    latest_url: String,
    token: Option<String>,
}

impl ReleaseResolver {
    pub fn new(config: &InstallerConfig) -> Result<Self, InstallerError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(InstallerError::network)?;

        Ok(Self {
            client,
            latest_url: config.latest_release_url(),
            token: config.github_token.clone(),
        })
    }

    /// Fetch latest release metadata (single attempt, no retry)
    pub async fn latest_release(&self) -> Result<GitHubRelease, InstallerError> {
        info!("Querying {}", self.latest_url);

        let mut request = self
            .client
            .get(&self.latest_url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(InstallerError::network)?;

        if !response.status().is_success() {
            return Err(InstallerError::Network(format!(
                "GitHub API error for {}: HTTP {}",
                self.latest_url,
                response.status()
            )));
        }

        let release: GitHubRelease = response.json().await.map_err(|e| {
            InstallerError::Network(format!("malformed release metadata: {e}"))
        })?;
        debug!(
            "Latest release {} has {} assets",
            release.tag_name,
            release.assets.len()
        );
        Ok(release)
    }

    /// Resolve the download URL of `platform`'s asset in the latest release
    pub async fn resolve(&self, platform: Platform) -> Result<ReleaseAsset, InstallerError> {
        let release = self.latest_release().await?;
        select_asset(&release, platform)
    }
}

/// Pick the first asset whose download URL contains the platform's filename
pub fn select_asset(
    release: &GitHubRelease,
    platform: Platform,
) -> Result<ReleaseAsset, InstallerError> {
    let filename = platform.asset_filename();

    release
        .assets
        .iter()
        .find(|a| a.browser_download_url.contains(filename))
        .map(|a| ReleaseAsset {
            platform,
            filename,
            download_url: a.browser_download_url.clone(),
            size: a.size,
            tag: release.tag_name.clone(),
        })
        .ok_or_else(|| InstallerError::AssetNotFound {
            filename: filename.to_string(),
            tag: release.tag_name.clone(),
            available: release.assets.iter().map(|a| a.name.clone()).collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(json: &str) -> GitHubRelease {
        serde_json::from_str(json).unwrap()
    }

    const PAYLOAD: &str = r#"{
        "tag_name": "v1.2.0",
        "name": "Mintas 1.2.0",
        "assets": [
            {"name": "mintas-windows.zip", "size": 10,
             "browser_download_url": "https://github.com/mintas-lang/mintas/releases/download/v1.2.0/mintas-windows.zip"},
            {"name": "mintas-linux.tar.gz", "size": 20,
             "browser_download_url": "https://github.com/mintas-lang/mintas/releases/download/v1.2.0/mintas-linux.tar.gz"},
            {"name": "mintas-macos.tar.gz", "size": 30,
             "browser_download_url": "https://github.com/mintas-lang/mintas/releases/download/v1.2.0/mintas-macos.tar.gz"}
        ]
    }"#;

    #[test]
    fn selects_matching_asset_per_platform() {
        let release = release(PAYLOAD);
        for platform in [Platform::Windows, Platform::Linux, Platform::MacOs] {
            let asset = select_asset(&release, platform).unwrap();
            assert!(asset.download_url.ends_with(platform.asset_filename()));
            assert_eq!(asset.filename, platform.asset_filename());
            assert_eq!(asset.tag, "v1.2.0");
        }
        assert_eq!(select_asset(&release, Platform::Linux).unwrap().size, 20);
    }

    #[test]
    fn missing_asset_is_reported_with_available_names() {
        let release = release(
            r#"{"tag_name": "v0.9.0", "assets": [
                {"name": "mintas-windows.zip", "browser_download_url": "https://x/mintas-windows.zip"}
            ]}"#,
        );
        match select_asset(&release, Platform::MacOs).unwrap_err() {
            InstallerError::AssetNotFound {
                filename,
                tag,
                available,
            } => {
                assert_eq!(filename, "mintas-macos.tar.gz");
                assert_eq!(tag, "v0.9.0");
                assert_eq!(available, vec!["mintas-windows.zip".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn release_without_assets_key_has_no_match() {
        let release = release(r#"{"tag_name": "v0.1.0"}"#);
        assert!(release.assets.is_empty());
        assert!(select_asset(&release, Platform::Linux).is_err());
    }

    #[test]
    fn first_duplicate_wins() {
        let release = release(
            r#"{"tag_name": "v1", "assets": [
                {"name": "a", "browser_download_url": "https://first/mintas-linux.tar.gz"},
                {"name": "b", "browser_download_url": "https://second/mintas-linux.tar.gz"}
            ]}"#,
        );
        let asset = select_asset(&release, Platform::Linux).unwrap();
        assert_eq!(asset.download_url, "https://first/mintas-linux.tar.gz");
    }
}
