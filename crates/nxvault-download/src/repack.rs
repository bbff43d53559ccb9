//! Post-processing of raw downloads into canonically named archives

use crate::DownloadError;
use crate::downloader::Artifact;
use nxvault_config::DownloadConfig;
use nxvault_library::{Title, canonical_archive_name};
use std::path::{Path, PathBuf};

/// Repacks raw downloads into the output directory
#[derive(Debug, Clone)]
pub struct RepackCoordinator {
    output_dir: PathBuf,
    extension: String,
    delete_raw_after_repack: bool,
}

impl RepackCoordinator {
    pub fn new(output_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into(),
            delete_raw_after_repack: true,
        }
    }

    pub fn from_config(config: &DownloadConfig) -> Self {
        Self::new(&config.download_dir, &config.archive_extension)
            .with_delete_raw(config.delete_raw_after_repack)
    }

    /// Remove the raw directory once a repack succeeds
    pub fn with_delete_raw(mut self, delete: bool) -> Self {
        self.delete_raw_after_repack = delete;
        self
    }

    /// Where a title's archive ends up
    pub fn output_path(&self, title: &Title, version: u32) -> PathBuf {
        self.output_dir.join(canonical_archive_name(
            title.title_type(),
            &title.display_name(),
            title.id,
            version,
            &self.extension,
        ))
    }

    /// Finish a download, returning the path that now holds the title
    ///
    /// Without `repack` the raw directory is returned untouched. A failed
    /// repack leaves no file at the target and keeps the raw directory.
    pub async fn finish(
        &self,
        artifact: &dyn Artifact,
        title: &Title,
        version: u32,
        repack: bool,
    ) -> Result<PathBuf, DownloadError> {
        let raw_dir = artifact.raw_dir().to_path_buf();
        if !repack {
            return Ok(raw_dir);
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let target = self.output_path(title, version);
        tracing::info!("Repacking {} into {}", title.id, target.display());

        if let Err(e) = artifact.repack(&target).await {
            tracing::warn!("Repack of {} failed: {}", title.id, e);
            Self::remove_partial(&target).await;
            return Err(DownloadError::RepackFailed {
                path: target,
                reason: e.to_string(),
            });
        }

        if self.delete_raw_after_repack && raw_dir != target {
            if let Err(e) = tokio::fs::remove_dir_all(&raw_dir).await {
                tracing::warn!("Failed to remove {}: {}", raw_dir.display(), e);
            } else {
                tracing::debug!("Removed raw download {}", raw_dir.display());
            }
        }

        Ok(target)
    }

    async fn remove_partial(target: &Path) {
        if tokio::fs::try_exists(target).await.unwrap_or(false) {
            match tokio::fs::remove_file(target).await {
                Ok(()) => tracing::warn!("Removed partial archive {}", target.display()),
                Err(e) => tracing::warn!(
                    "Failed to remove partial archive {}: {}",
                    target.display(),
                    e
                ),
            }
        }
    }
}
