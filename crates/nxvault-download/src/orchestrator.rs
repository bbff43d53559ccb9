//! Download orchestration
//!
//! Every call takes the collection explicitly. The index has no locking of
//! its own, so calls that share one index run one at a time.

use crate::DownloadError;
use crate::downloader::{DownloadOptions, Downloader};
use crate::plan::{DownloadStep, ScopeOption, expand_scope};
use crate::repack::RepackCoordinator;
use nxvault_library::{
    CollectionIndex, CollectionState, GameInfo, LibraryLoader, Title, TitleId, TitleType, Update,
};
use std::path::PathBuf;
use std::sync::Arc;

/// A scope step that finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedStep {
    pub step: DownloadStep,
    pub path: PathBuf,
}

/// A scope step that failed; later steps still ran
#[derive(Debug)]
pub struct FailedStep {
    pub step: DownloadStep,
    pub error: DownloadError,
}

/// Outcome of a scope download
#[derive(Debug, Default)]
pub struct ScopeReport {
    pub completed: Vec<CompletedStep>,
    pub failed: Vec<FailedStep>,
}

impl ScopeReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

/// Runs downloads against a [`Downloader`] and records them in a collection
pub struct DownloadOrchestrator {
    downloader: Arc<dyn Downloader>,
    repacker: RepackCoordinator,
    download_dir: PathBuf,
}

impl DownloadOrchestrator {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        repacker: RepackCoordinator,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            downloader,
            repacker,
            download_dir: download_dir.into(),
        }
    }

    /// Fetch the latest version list and record it on the collection
    pub async fn refresh_latest_versions(
        &self,
        index: &mut CollectionIndex,
    ) -> Result<usize, DownloadError> {
        let versions = self.downloader.latest_versions().await?;
        Ok(LibraryLoader::new().apply_latest_versions(index, &versions))
    }

    /// Download a single artifact
    ///
    /// Version 0 is only valid for base games and DLC, any other version
    /// only for updates. Returns the path now holding the title.
    pub async fn download_title(
        &self,
        index: &mut CollectionIndex,
        id: TitleId,
        version: u32,
        options: DownloadOptions,
    ) -> Result<PathBuf, DownloadError> {
        let title = Self::resolve_title(index, id, version)?;
        Self::check_version(&title, version)?;

        let dest_dir = self.download_dir.join(id.to_string());
        tokio::fs::create_dir_all(&dest_dir).await?;

        tracing::info!(
            "Downloading {} {} v{} into {}",
            title.title_type().as_str(),
            id,
            version,
            dest_dir.display()
        );
        let artifact = self
            .downloader
            .download_title(&title, version, &dest_dir, options)
            .await?;
        let path = self
            .repacker
            .finish(artifact.as_ref(), &title, version, options.repack)
            .await?;

        self.record(index, &title, version, path.clone())?;
        Ok(path)
    }

    /// Download everything a scope implies, in order
    ///
    /// A failed step is recorded and the remaining steps still run. An
    /// update ID stands for its game.
    pub async fn download_game(
        &self,
        index: &mut CollectionIndex,
        id: TitleId,
        version: u32,
        scope: ScopeOption,
        options: DownloadOptions,
    ) -> Result<ScopeReport, DownloadError> {
        let found = if id.is_update() {
            index.get_base(id)
        } else {
            index.get(id)
        };
        let target = found
            .map(|item| item.title.clone())
            .ok_or(DownloadError::TitleNotFound(id))?;
        let owner = Self::owner_info(index, &target);
        let steps = expand_scope(scope, &target, owner.as_ref(), version)?;

        tracing::info!("Scope {} for {} expands to {} steps", scope, id, steps.len());

        let mut report = ScopeReport::default();
        for step in steps {
            match self
                .download_title(index, step.id(), step.version(), options)
                .await
            {
                Ok(path) => report.completed.push(CompletedStep { step, path }),
                Err(error) => {
                    tracing::warn!("Step {} failed: {}", step, error);
                    report.failed.push(FailedStep { step, error });
                }
            }
        }

        tracing::info!(
            "Scope {} for {}: {} of {} steps completed",
            scope,
            id,
            report.completed.len(),
            report.total()
        );
        Ok(report)
    }

    /// Download a scope at the game's latest known version
    pub async fn download_latest(
        &self,
        index: &mut CollectionIndex,
        id: TitleId,
        scope: ScopeOption,
        options: DownloadOptions,
    ) -> Result<ScopeReport, DownloadError> {
        let version = index
            .get_base(id)
            .and_then(|item| item.title.game_info())
            .map(|info| info.latest_version.unwrap_or_else(|| info.newest_version()))
            .ok_or(DownloadError::TitleNotFound(id))?;
        self.download_game(index, id, version, scope, options).await
    }

    fn owner_info(index: &CollectionIndex, target: &Title) -> Option<GameInfo> {
        if target.game_info().is_some() {
            return None;
        }
        index
            .get(target.base_id())
            .and_then(|item| item.title.game_info())
            .cloned()
    }

    /// Updates are not indexed as entries, so they are built from their game
    fn resolve_title(
        index: &CollectionIndex,
        id: TitleId,
        version: u32,
    ) -> Result<Title, DownloadError> {
        if !id.is_update() {
            return index
                .get(id)
                .map(|item| item.title.clone())
                .ok_or(DownloadError::TitleNotFound(id));
        }

        let game_id = id.base_game_from_update()?;
        let game = index.get(game_id).ok_or(DownloadError::TitleNotFound(id))?;
        let mut update = Update::new(id, game_id, version);
        update.title_key = game
            .title
            .game_info()
            .and_then(|info| info.update(version))
            .and_then(|known| known.title_key.clone())
            .or_else(|| game.title.title_key.clone());
        Ok(Title::from_update(&update, game.title.name.clone()))
    }

    fn check_version(title: &Title, version: u32) -> Result<(), DownloadError> {
        match (title.title_type(), version) {
            (TitleType::Game | TitleType::Dlc, 0) => Ok(()),
            (TitleType::Update, v) if v > 0 => Ok(()),
            (TitleType::Update, _) => Err(DownloadError::InvalidArgument(format!(
                "update {} needs a version above 0",
                title.id
            ))),
            (kind, v) => Err(DownloadError::InvalidArgument(format!(
                "{} {} can only be downloaded at version 0, not {}",
                kind.as_str(),
                title.id,
                v
            ))),
        }
    }

    fn record(
        &self,
        index: &mut CollectionIndex,
        title: &Title,
        version: u32,
        path: PathBuf,
    ) -> Result<(), DownloadError> {
        if title.title_type() == TitleType::Update {
            let mut update = Update::new(title.id, title.base_id(), version);
            update.title_key = title.title_key.clone();
            update.rom_path = Some(path);
            index.attach_update(update)?;
            return Ok(());
        }

        let size = std::fs::metadata(&path)
            .ok()
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len());
        if let Some(item) = index.get_mut(title.id) {
            item.state = CollectionState::Owned;
            item.rom_path = Some(path);
            if let Some(size) = size {
                item.size = size;
            }
        }
        Ok(())
    }
}
