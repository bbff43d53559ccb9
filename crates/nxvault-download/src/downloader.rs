//! Collaborator contract for fetching titles from the remote source

use crate::DownloadError;
use async_trait::async_trait;
use nxvault_config::DownloadConfig;
use nxvault_library::{Title, TitleId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Per-call download switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Repack the raw download into a single archive
    pub repack: bool,
    /// Verify content hashes while downloading
    pub verify: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            repack: true,
            verify: true,
        }
    }
}

impl From<&DownloadConfig> for DownloadOptions {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            repack: config.repack,
            verify: config.verify,
        }
    }
}

/// Handle to a finished raw download
#[async_trait]
pub trait Artifact: Send + Sync {
    /// Directory holding the raw content
    fn raw_dir(&self) -> &Path;

    /// Package the raw content into a single archive at `dest`
    async fn repack(&self, dest: &Path) -> Result<(), DownloadError>;
}

/// Remote distribution source
///
/// Implementations talk to the CDN, decrypt and write raw content. The
/// orchestrator only decides what to fetch and records the outcome.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Latest known version per base game ID
    async fn latest_versions(&self) -> Result<HashMap<TitleId, u32>, DownloadError>;

    /// Fetch one title at one version into `dest_dir`
    async fn download_title(
        &self,
        title: &Title,
        version: u32,
        dest_dir: &Path,
        options: DownloadOptions,
    ) -> Result<Box<dyn Artifact>, DownloadError>;

    /// Cache the icon of a title locally, returning its path
    async fn download_remote_image(&self, id: TitleId) -> Result<PathBuf, DownloadError>;
}
