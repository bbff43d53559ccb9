//! Downloader backed by HTTP endpoints and an external CDN tool
//!
//! Version lists and icons come over HTTP. Title content is fetched and
//! repacked by an external command line tool:
//!
//! ```text
//! <tool> download --title-id ID --version V --output DIR [--title-key KEY] [--no-verify]
//! <tool> repack --input DIR --output FILE
//! ```

use crate::DownloadError;
use crate::downloader::{Artifact, DownloadOptions, Downloader};
use async_trait::async_trait;
use nxvault_config::RemoteConfig;
use nxvault_library::{Title, TitleId};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

const ICON_ID_PLACEHOLDER: &str = "{id}";

/// Entry of the versions document
///
/// Either the latest version directly, or a map of every released version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VersionEntry {
    Latest(u32),
    History(HashMap<String, serde_json::Value>),
}

impl VersionEntry {
    fn latest(&self) -> Option<u32> {
        match self {
            VersionEntry::Latest(v) => Some(*v),
            VersionEntry::History(versions) => {
                versions.keys().filter_map(|v| v.parse::<u32>().ok()).max()
            }
        }
    }
}

/// Reduce a versions document to base game ID -> latest version
///
/// Keys may be base game or update IDs; unparseable entries are skipped.
fn collect_latest(document: HashMap<String, VersionEntry>) -> HashMap<TitleId, u32> {
    let mut latest = HashMap::new();
    for (raw_id, entry) in document {
        let Some(id) = TitleId::parse(&raw_id).and_then(TitleId::base_game_id) else {
            tracing::debug!("Skipping versions entry '{}'", raw_id);
            continue;
        };
        if let Some(version) = entry.latest() {
            let slot = latest.entry(id).or_insert(version);
            *slot = (*slot).max(version);
        }
    }
    latest
}

/// [`Downloader`] using HTTP for metadata and an external tool for content
pub struct ExternalDownloader {
    client: reqwest::Client,
    versions_url: Option<String>,
    icon_url: Option<String>,
    icon_cache_dir: PathBuf,
    tool_path: PathBuf,
}

impl ExternalDownloader {
    pub fn new(config: &RemoteConfig) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("nxvault/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            versions_url: config.versions_url.clone(),
            icon_url: config.icon_url.clone(),
            icon_cache_dir: config.icon_cache_dir.clone(),
            tool_path: config.tool_path.clone(),
        })
    }

    /// Cache location of a title's icon
    pub fn icon_path(&self, id: TitleId) -> PathBuf {
        self.icon_cache_dir.join(format!("{}.jpg", id))
    }

    fn icon_url_for(template: &str, id: TitleId) -> String {
        template.replace(ICON_ID_PLACEHOLDER, &id.to_string())
    }

    fn download_args(
        title: &Title,
        version: u32,
        dest_dir: &Path,
        options: DownloadOptions,
    ) -> Vec<String> {
        let mut args = vec![
            "download".to_string(),
            "--title-id".to_string(),
            title.id.to_string(),
            "--version".to_string(),
            version.to_string(),
            "--output".to_string(),
            dest_dir.display().to_string(),
        ];
        if let Some(key) = &title.title_key {
            args.push("--title-key".to_string());
            args.push(key.to_string());
        }
        if !options.verify {
            args.push("--no-verify".to_string());
        }
        args
    }
}

/// Run the tool and turn a non-zero exit into an error
async fn run_tool(tool: &Path, args: &[String]) -> Result<(), DownloadError> {
    tracing::debug!("Running {} {}", tool.display(), args.join(" "));

    let output = Command::new(tool)
        .args(args)
        .output()
        .await
        .map_err(|e| DownloadError::Tool(format!("{}: {}", tool.display(), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DownloadError::Tool(format!(
            "{} exited with {}: {}",
            tool.display(),
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}

/// Raw download produced by the external tool
struct ToolArtifact {
    tool_path: PathBuf,
    raw_dir: PathBuf,
}

#[async_trait]
impl Artifact for ToolArtifact {
    fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    async fn repack(&self, dest: &Path) -> Result<(), DownloadError> {
        let args = vec![
            "repack".to_string(),
            "--input".to_string(),
            self.raw_dir.display().to_string(),
            "--output".to_string(),
            dest.display().to_string(),
        ];
        run_tool(&self.tool_path, &args).await
    }
}

#[async_trait]
impl Downloader for ExternalDownloader {
    async fn latest_versions(&self) -> Result<HashMap<TitleId, u32>, DownloadError> {
        let Some(url) = &self.versions_url else {
            tracing::debug!("No versions URL configured");
            return Ok(HashMap::new());
        };

        tracing::debug!("Fetching latest versions from {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::DownloadFailed(format!(
                "versions list returned {}",
                response.status()
            )));
        }

        let document: HashMap<String, VersionEntry> = response.json().await?;
        let latest = collect_latest(document);
        tracing::info!("Fetched latest versions for {} games", latest.len());
        Ok(latest)
    }

    async fn download_title(
        &self,
        title: &Title,
        version: u32,
        dest_dir: &Path,
        options: DownloadOptions,
    ) -> Result<Box<dyn Artifact>, DownloadError> {
        let args = Self::download_args(title, version, dest_dir, options);
        run_tool(&self.tool_path, &args).await?;

        Ok(Box::new(ToolArtifact {
            tool_path: self.tool_path.clone(),
            raw_dir: dest_dir.to_path_buf(),
        }))
    }

    async fn download_remote_image(&self, id: TitleId) -> Result<PathBuf, DownloadError> {
        let path = self.icon_path(id);
        if tokio::fs::try_exists(&path).await? {
            return Ok(path);
        }

        let template = self
            .icon_url
            .as_deref()
            .ok_or(DownloadError::NotConfigured("remote.icon_url"))?;
        let url = Self::icon_url_for(template, id);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::DownloadFailed(format!(
                "icon for {} returned {}",
                id,
                response.status()
            )));
        }
        let bytes = response.bytes().await?;

        tokio::fs::create_dir_all(&self.icon_cache_dir).await?;
        tokio::fs::write(&path, &bytes).await?;
        tracing::debug!("Cached icon for {} at {}", id, path.display());
        Ok(path)
    }
}
