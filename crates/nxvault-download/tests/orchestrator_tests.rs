//! Integration tests for download orchestration against a recording downloader

use async_trait::async_trait;
use nxvault_download::{
    Artifact, DownloadError, DownloadOptions, DownloadOrchestrator, DownloadStep, Downloader,
    RepackCoordinator, ScopeOption,
};
use nxvault_library::{
    CollectionIndex, CollectionItem, CollectionState, GameFields, Title, TitleId, VERSION_STRIDE,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Records every download and writes a fake archive on repack
#[derive(Default)]
struct RecordingDownloader {
    calls: Mutex<Vec<(TitleId, u32)>>,
    fail_download: HashSet<TitleId>,
    fail_repack: HashSet<TitleId>,
    latest: HashMap<TitleId, u32>,
}

impl RecordingDownloader {
    fn calls(&self) -> Vec<(TitleId, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

struct FakeArtifact {
    raw_dir: PathBuf,
    fail: bool,
}

#[async_trait]
impl Artifact for FakeArtifact {
    fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    async fn repack(&self, dest: &Path) -> Result<(), DownloadError> {
        tokio::fs::write(dest, b"archive").await?;
        if self.fail {
            Err(DownloadError::Tool("repack crashed".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Downloader for RecordingDownloader {
    async fn latest_versions(&self) -> Result<HashMap<TitleId, u32>, DownloadError> {
        Ok(self.latest.clone())
    }

    async fn download_title(
        &self,
        title: &Title,
        version: u32,
        dest_dir: &Path,
        _options: DownloadOptions,
    ) -> Result<Box<dyn Artifact>, DownloadError> {
        self.calls.lock().unwrap().push((title.id, version));
        if self.fail_download.contains(&title.id) {
            return Err(DownloadError::DownloadFailed("connection reset".into()));
        }

        tokio::fs::write(dest_dir.join(format!("{}.nca", version)), b"raw").await?;
        Ok(Box::new(FakeArtifact {
            raw_dir: dest_dir.to_path_buf(),
            fail: self.fail_repack.contains(&title.id),
        }))
    }

    async fn download_remote_image(&self, id: TitleId) -> Result<PathBuf, DownloadError> {
        Err(DownloadError::DownloadFailed(format!("no icon for {}", id)))
    }
}

/// Test environment with a small collection and a download directory
struct DownloadTestEnv {
    #[allow(dead_code)]
    temp_dir: TempDir,
    download_dir: PathBuf,
    index: CollectionIndex,
}

const GAME: &str = "0100ABCD00000000";
const UPDATE: &str = "0100ABCD00000800";
const DLC_1: &str = "0100ABCD00001001";
const DLC_2: &str = "0100ABCD00001002";

fn id(s: &str) -> TitleId {
    s.parse().unwrap()
}

fn opts() -> DownloadOptions {
    DownloadOptions::default()
}

impl DownloadTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let download_dir = temp_dir.path().join("downloads");

        let mut index = CollectionIndex::new();
        index.upsert_game(
            id(GAME),
            GameFields {
                name: Some("Some Game".into()),
                ..Default::default()
            },
        );
        for dlc in [DLC_1, DLC_2] {
            let title = Title::dlc(id(dlc), id(GAME)).with_name(format!("[DLC] Pack {}", dlc));
            index.attach_dlc(id(GAME), CollectionItem::new(title));
        }
        index.set_latest_version(id(GAME), 3 * VERSION_STRIDE);

        Self {
            temp_dir,
            download_dir,
            index,
        }
    }

    fn orchestrator(&self, downloader: Arc<RecordingDownloader>) -> DownloadOrchestrator {
        DownloadOrchestrator::new(
            downloader,
            RepackCoordinator::new(&self.download_dir, "nsp"),
            &self.download_dir,
        )
    }
}

#[tokio::test]
async fn test_full_scope_downloads_in_order() {
    let mut env = DownloadTestEnv::new();
    let downloader = Arc::new(RecordingDownloader::default());
    let orchestrator = env.orchestrator(downloader.clone());

    let report = orchestrator
        .download_game(
            &mut env.index,
            id(GAME),
            3 * VERSION_STRIDE,
            ScopeOption::BaseAndUpdateAndDlc,
            opts(),
        )
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(
        downloader.calls(),
        vec![
            (id(GAME), 0),
            (id(UPDATE), 0x30000),
            (id(UPDATE), 0x20000),
            (id(UPDATE), 0x10000),
            (id(DLC_1), 0),
            (id(DLC_2), 0),
        ]
    );

    let game = env.index.get(id(GAME)).unwrap();
    assert_eq!(game.state, CollectionState::Owned);
    assert_eq!(
        game.rom_path.as_deref(),
        Some(
            env.download_dir
                .join("Some Game [0100ABCD00000000][v0].nsp")
                .as_path()
        )
    );
    assert_eq!(game.size, 7);

    let info = game.title.game_info().unwrap();
    let versions: Vec<u32> = info.updates.iter().map(|u| u.version).collect();
    assert_eq!(versions, vec![0x10000, 0x20000, 0x30000]);
    assert!(
        info.update(0x30000)
            .unwrap()
            .rom_path
            .as_ref()
            .unwrap()
            .ends_with("Some Game [UPD][0100ABCD00000800][v196608].nsp")
    );

    assert_eq!(
        env.index.get(id(DLC_2)).unwrap().state,
        CollectionState::Owned
    );
    assert!(
        env.download_dir
            .join(format!("[DLC] Pack {} [{}][v0].nsp", DLC_1, DLC_1))
            .exists()
    );
}

#[tokio::test]
async fn test_single_artifact_rule() {
    let mut env = DownloadTestEnv::new();
    let downloader = Arc::new(RecordingDownloader::default());
    let orchestrator = env.orchestrator(downloader.clone());

    let err = orchestrator
        .download_title(&mut env.index, id(GAME), VERSION_STRIDE, opts())
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::InvalidArgument(_)));

    let err = orchestrator
        .download_title(&mut env.index, id(UPDATE), 0, opts())
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::InvalidArgument(_)));

    assert!(downloader.calls().is_empty());

    orchestrator
        .download_title(&mut env.index, id(GAME), 0, opts())
        .await
        .unwrap();
    assert_eq!(downloader.calls(), vec![(id(GAME), 0)]);
    // Raw directory is gone once the repack succeeded
    assert!(!env.download_dir.join(GAME).exists());
}

#[tokio::test]
async fn test_unknown_title() {
    let mut env = DownloadTestEnv::new();
    let orchestrator = env.orchestrator(Arc::new(RecordingDownloader::default()));

    let err = orchestrator
        .download_title(&mut env.index, id("0100000000010000"), 0, opts())
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::TitleNotFound(_)));

    let err = orchestrator
        .download_game(
            &mut env.index,
            id("0100000000010000"),
            0,
            ScopeOption::BaseOnly,
            opts(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::TitleNotFound(_)));
}

#[tokio::test]
async fn test_failed_steps_do_not_stop_the_scope() {
    let mut env = DownloadTestEnv::new();
    let downloader = Arc::new(RecordingDownloader {
        fail_download: HashSet::from([id(DLC_1)]),
        fail_repack: HashSet::from([id(UPDATE)]),
        ..Default::default()
    });
    let orchestrator = env.orchestrator(downloader.clone());

    let report = orchestrator
        .download_game(
            &mut env.index,
            id(GAME),
            2 * VERSION_STRIDE,
            ScopeOption::UpdateAndDlc,
            opts(),
        )
        .await
        .unwrap();

    assert_eq!(downloader.calls().len(), 4);
    assert_eq!(report.total(), 4);
    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.completed[0].step, DownloadStep::Dlc(id(DLC_2)));
    assert_eq!(report.failed.len(), 3);
    assert!(
        report
            .failed
            .iter()
            .any(|f| matches!(f.error, DownloadError::RepackFailed { .. }))
    );

    // No partial archive and no update recorded for the failed repacks
    assert!(
        !env.download_dir
            .join("Some Game [UPD][0100ABCD00000800][v131072].nsp")
            .exists()
    );
    assert!(env.download_dir.join(UPDATE).join("131072.nca").exists());
    let game = env.index.get(id(GAME)).unwrap();
    assert!(game.title.game_info().unwrap().updates.is_empty());
    assert_eq!(
        env.index.get(id(DLC_1)).unwrap().state,
        CollectionState::NotOwned
    );
}

#[tokio::test]
async fn test_dlc_target_with_all_dlc() {
    let mut env = DownloadTestEnv::new();
    let downloader = Arc::new(RecordingDownloader::default());
    let orchestrator = env.orchestrator(downloader.clone());

    orchestrator
        .download_game(&mut env.index, id(DLC_2), 0, ScopeOption::AllDlc, opts())
        .await
        .unwrap();
    assert_eq!(downloader.calls(), vec![(id(DLC_2), 0)]);
}

#[tokio::test]
async fn test_download_latest_uses_known_version() {
    let mut env = DownloadTestEnv::new();
    let downloader = Arc::new(RecordingDownloader {
        latest: HashMap::from([(id(GAME), VERSION_STRIDE)]),
        ..Default::default()
    });
    let orchestrator = env.orchestrator(downloader.clone());

    assert_eq!(
        orchestrator
            .refresh_latest_versions(&mut env.index)
            .await
            .unwrap(),
        1
    );

    let report = orchestrator
        .download_latest(&mut env.index, id(GAME), ScopeOption::UpdateOnly, opts())
        .await
        .unwrap();
    assert_eq!(report.completed.len(), 1);
    assert_eq!(downloader.calls(), vec![(id(UPDATE), VERSION_STRIDE)]);
}

#[tokio::test]
async fn test_without_repack_keeps_raw_directory() {
    let mut env = DownloadTestEnv::new();
    let downloader = Arc::new(RecordingDownloader::default());
    let orchestrator = env.orchestrator(downloader);
    let raw = DownloadOptions {
        repack: false,
        verify: true,
    };

    let path = orchestrator
        .download_title(&mut env.index, id(GAME), 0, raw)
        .await
        .unwrap();
    assert_eq!(path, env.download_dir.join(GAME));
    assert!(path.join("0.nca").exists());

    let game = env.index.get(id(GAME)).unwrap();
    assert_eq!(game.rom_path.as_ref(), Some(&path));
    assert_eq!(game.state, CollectionState::Owned);

    // Options belong to the call, not the orchestrator
    let path = orchestrator
        .download_title(&mut env.index, id(DLC_1), 0, opts())
        .await
        .unwrap();
    assert_eq!(
        path,
        env.download_dir.join(format!("[DLC] Pack {} [{}][v0].nsp", DLC_1, DLC_1))
    );
    assert!(!env.download_dir.join(DLC_1).exists());
}

#[tokio::test]
async fn test_update_id_targets_its_game() {
    let mut env = DownloadTestEnv::new();
    let downloader = Arc::new(RecordingDownloader::default());
    let orchestrator = env.orchestrator(downloader.clone());

    let report = orchestrator
        .download_game(
            &mut env.index,
            id(UPDATE),
            VERSION_STRIDE,
            ScopeOption::UpdateOnly,
            opts(),
        )
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(downloader.calls(), vec![(id(UPDATE), VERSION_STRIDE)]);

    let report = orchestrator
        .download_latest(&mut env.index, id(UPDATE), ScopeOption::UpdateOnly, opts())
        .await
        .unwrap();
    assert_eq!(report.total(), 3);
    assert!(report.is_success());

    let game = env.index.get(id(GAME)).unwrap();
    let versions: Vec<u32> = game
        .title
        .game_info()
        .unwrap()
        .updates
        .iter()
        .map(|u| u.version)
        .collect();
    assert_eq!(versions, vec![0x10000, 0x20000, 0x30000]);

    let err = orchestrator
        .download_game(
            &mut env.index,
            id("0100000000010800"),
            VERSION_STRIDE,
            ScopeOption::UpdateOnly,
            opts(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DownloadError::TitleNotFound(_)));
}
