//! Populating a collection from key lists, the metadata overlay and local files
//!
//! Every pass can be re-run against an already populated index; entries are
//! merged, never duplicated.

use crate::LibraryError;
use crate::collection::{CollectionIndex, DlcAttachment, GameFields};
use crate::filename::ArchiveKind;
use crate::identity::{IdRole, TitleId};
use crate::keyfile::{KeyEntry, parse_key_line};
use crate::overlay::{OverlayRecord, OverlayStore};
use crate::scanner::{ArchiveScanner, ScanConfig, ScanResult};
use crate::title::{CollectionItem, CollectionState, Title, TitleType, Update, has_dlc_tag};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

/// Summary of a key list or overlay pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub games: usize,
    pub dlc: usize,
    pub updates: usize,
    pub stubs_created: usize,
    pub skipped: usize,
    pub diagnostics: Vec<String>,
}

impl LoadReport {
    fn diagnostic(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.skipped += 1;
        self.diagnostics.push(message);
    }
}

/// How a key list line maps onto the collection
enum KeyLineKind {
    Game,
    Dlc { base_id: TitleId },
    Unrecognized,
}

fn classify(entry: &KeyEntry) -> KeyLineKind {
    if entry.id.is_base_game() {
        return KeyLineKind::Game;
    }
    if entry.id.is_dlc() || has_dlc_tag(&entry.name) {
        return KeyLineKind::Dlc {
            base_id: entry.id.owning_base(),
        };
    }
    KeyLineKind::Unrecognized
}

/// Records holding only updates have lost their game row; no stub is made
fn carries_title(record: &OverlayRecord) -> bool {
    record.title_type.is_some()
        || record.name.is_some()
        || record.title_key.is_some()
        || record.state.is_some()
}

/// Populates a [`CollectionIndex`]
pub struct LibraryLoader {
    scanner: ArchiveScanner,
}

impl Default for LibraryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryLoader {
    pub fn new() -> Self {
        Self {
            scanner: ArchiveScanner::new(),
        }
    }

    pub fn with_scan_config(config: ScanConfig) -> Self {
        Self {
            scanner: ArchiveScanner::with_config(config),
        }
    }

    /// Ingest a key list file
    pub fn load_key_file(
        &self,
        index: &mut CollectionIndex,
        path: &Path,
    ) -> Result<LoadReport, LibraryError> {
        if !path.exists() {
            return Err(LibraryError::PathNotFound(path.to_path_buf()));
        }
        let report = self.load_keys(index, BufReader::new(File::open(path)?))?;
        tracing::info!(
            "Loaded {} games and {} DLC from {} ({} lines skipped)",
            report.games,
            report.dlc,
            path.display(),
            report.skipped
        );
        Ok(report)
    }

    /// Ingest key list lines
    pub fn load_keys<R: BufRead>(
        &self,
        index: &mut CollectionIndex,
        reader: R,
    ) -> Result<LoadReport, LibraryError> {
        let mut report = LoadReport::default();
        for entry in Self::read_entries(reader, &mut report)? {
            Self::ingest(index, entry, None, &mut report);
        }
        Ok(report)
    }

    /// Ingest only lines whose IDs are not yet indexed, tagged `New`
    ///
    /// Returns the new entries as they stand in the index after the pass.
    pub fn diff_key_file(
        &self,
        index: &mut CollectionIndex,
        path: &Path,
    ) -> Result<Vec<CollectionItem>, LibraryError> {
        if !path.exists() {
            return Err(LibraryError::PathNotFound(path.to_path_buf()));
        }
        self.diff_keys(index, BufReader::new(File::open(path)?))
    }

    pub fn diff_keys<R: BufRead>(
        &self,
        index: &mut CollectionIndex,
        reader: R,
    ) -> Result<Vec<CollectionItem>, LibraryError> {
        let mut report = LoadReport::default();
        let entries = Self::read_entries(reader, &mut report)?;

        // Decide what is new before any line can create a stub
        let mut seen = HashSet::new();
        let fresh: Vec<KeyEntry> = entries
            .into_iter()
            .filter(|entry| !index.contains(entry.id) && seen.insert(entry.id))
            .collect();

        let mut added = Vec::new();
        for entry in fresh {
            let id = entry.id;
            if Self::ingest(index, entry, Some(CollectionState::New), &mut report) {
                added.push(id);
            }
        }

        tracing::info!("Key list diff found {} new titles", added.len());
        Ok(added
            .into_iter()
            .filter_map(|id| index.get(id).cloned())
            .collect())
    }

    fn read_entries<R: BufRead>(
        reader: R,
        report: &mut LoadReport,
    ) -> Result<Vec<KeyEntry>, LibraryError> {
        let mut entries = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            match parse_key_line(&line) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => report.diagnostic(format!("line {}: {}", number + 1, e)),
            }
        }
        Ok(entries)
    }

    /// Returns whether the line produced an entry
    fn ingest(
        index: &mut CollectionIndex,
        entry: KeyEntry,
        state: Option<CollectionState>,
        report: &mut LoadReport,
    ) -> bool {
        match classify(&entry) {
            KeyLineKind::Game => {
                index.upsert_game(
                    entry.id,
                    GameFields {
                        title_key: entry.title_key,
                        name: Some(entry.name),
                        state,
                        favorite: None,
                    },
                );
                report.games += 1;
                true
            }
            KeyLineKind::Dlc { base_id } => {
                let title = Title::dlc(entry.id, base_id)
                    .with_name(entry.name)
                    .with_key(entry.title_key);
                let item = CollectionItem::new(title).with_state(state.unwrap_or_default());
                let (_, attachment) = index.attach_dlc(base_id, item);
                if attachment == DlcAttachment::StubCreated {
                    report.stubs_created += 1;
                }
                report.dlc += 1;
                true
            }
            KeyLineKind::Unrecognized => {
                report.diagnostic(format!(
                    "unrecognized key line for {} ({})",
                    entry.id, entry.name
                ));
                false
            }
        }
    }

    /// Merge persisted overlay records into the index
    pub fn apply_overlay(
        &self,
        index: &mut CollectionIndex,
        records: Vec<OverlayRecord>,
    ) -> LoadReport {
        let mut report = LoadReport::default();

        for record in records {
            let id = record.id;
            if index.contains(id) {
                Self::merge_record(index, &record);
            } else if carries_title(&record)
                && !Self::create_from_record(index, &record, &mut report)
            {
                continue;
            }

            for update in record.updates {
                match index.attach_update(update.into_update(id)) {
                    Ok(()) => report.updates += 1,
                    Err(e) => report.diagnostic(e.to_string()),
                }
            }
        }

        report
    }

    /// Local state always wins; name and key only fill gaps
    fn merge_record(index: &mut CollectionIndex, record: &OverlayRecord) {
        let Some(item) = index.get_mut(record.id) else {
            return;
        };

        if let Some(favorite) = record.favorite {
            item.favorite = favorite;
        }
        if let Some(state) = record.state {
            item.state = state;
        }
        if let Some(path) = &record.rom_path {
            item.rom_path = Some(path.clone());
        }
        if let Some(size) = record.size {
            item.size = size;
        }
        if item.title.name.is_none() {
            item.title.name = record.name.clone();
        }
        if item.title.title_key.is_none() {
            item.title.title_key = record.title_key.clone();
        }
    }

    fn create_from_record(
        index: &mut CollectionIndex,
        record: &OverlayRecord,
        report: &mut LoadReport,
    ) -> bool {
        let id = record.id;
        let title_type = record.title_type.or(match id.role() {
            IdRole::BaseGame => Some(TitleType::Game),
            IdRole::Dlc => Some(TitleType::Dlc),
            _ => None,
        });

        match title_type {
            Some(TitleType::Game) => {
                index.upsert_game(
                    id,
                    GameFields {
                        title_key: record.title_key.clone(),
                        name: record.name.clone(),
                        state: record.state,
                        favorite: record.favorite,
                    },
                );
                report.games += 1;
            }
            Some(TitleType::Dlc) => {
                let base_id = record.base_id.unwrap_or_else(|| id.owning_base());
                let mut title = Title::dlc(id, base_id).with_key(record.title_key.clone());
                title.name = record.name.clone();
                let (_, attachment) = index.attach_dlc(base_id, CollectionItem::new(title));
                if attachment == DlcAttachment::StubCreated {
                    report.stubs_created += 1;
                }
                report.dlc += 1;
            }
            Some(TitleType::Update) | None => {
                report.diagnostic(format!("overlay record {} is not a game or DLC", id));
                return false;
            }
        }

        Self::merge_record(index, record);
        true
    }

    /// Load the overlay file if present
    ///
    /// A missing file is not an error; it is created on the next save.
    pub fn load_overlay(
        &self,
        index: &mut CollectionIndex,
        path: &Path,
    ) -> Result<Option<LoadReport>, LibraryError> {
        if !path.exists() {
            tracing::info!(
                "No metadata overlay at {}, it will be created on save",
                path.display()
            );
            return Ok(None);
        }

        let store = OverlayStore::open(path)?;
        let records = store.load_records()?;
        let report = self.apply_overlay(index, records);
        tracing::info!(
            "Applied metadata overlay from {} ({} updates, {} skipped)",
            path.display(),
            report.updates,
            report.skipped
        );
        Ok(Some(report))
    }

    /// Persist the whole collection as the overlay
    pub fn save_overlay(
        &self,
        index: &CollectionIndex,
        path: &Path,
    ) -> Result<usize, LibraryError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut store = OverlayStore::open(path)?;
        let saved = store.save_items(index.iter())?;
        tracing::info!(
            "Saved metadata overlay for {} titles to {}",
            saved,
            path.display()
        );
        Ok(saved)
    }

    /// Match local archives against the index
    pub fn scan_roms(
        &self,
        index: &mut CollectionIndex,
        root: &Path,
    ) -> Result<ScanResult, LibraryError> {
        let start = Instant::now();
        let files = self.scanner.scan(root)?;
        let mut result = ScanResult {
            files_found: files.len(),
            ..Default::default()
        };

        for file in files {
            let parsed = match file.name {
                Ok(parsed) => parsed,
                Err(reason) => {
                    tracing::warn!("Skipping {}: {}", file.path.display(), reason);
                    result.errors.push(reason);
                    continue;
                }
            };

            match parsed.kind {
                ArchiveKind::Game | ArchiveKind::Dlc | ArchiveKind::Demo => {
                    match index.get_mut(parsed.id) {
                        Some(item) => {
                            tracing::debug!("Matched {} to {}", file.path.display(), parsed.id);
                            item.mark_local(file.path, Some(file.size));
                            result.titles_matched += 1;
                        }
                        None => result.unmatched += 1,
                    }
                }
                ArchiveKind::Update => {
                    let game_id = match parsed.id.base_game_from_update() {
                        Ok(game_id) => game_id,
                        Err(e) => {
                            tracing::warn!("Skipping {}: {}", file.path.display(), e);
                            result.errors.push(e.to_string());
                            continue;
                        }
                    };
                    let mut update = Update::new(parsed.id, game_id, parsed.version);
                    update.title_key = index
                        .get(game_id)
                        .and_then(|game| game.title.game_info())
                        .and_then(|info| info.update(parsed.version))
                        .and_then(|known| known.title_key.clone());
                    update.rom_path = Some(file.path);

                    match index.attach_update(update) {
                        Ok(()) => result.updates_attached += 1,
                        Err(e) => {
                            tracing::warn!("{}", e);
                            result.errors.push(e.to_string());
                        }
                    }
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Scanned {}: {} files, {} matched, {} updates, {} unmatched",
            root.display(),
            result.files_found,
            result.titles_matched,
            result.updates_attached,
            result.unmatched
        );
        Ok(result)
    }

    /// Record the latest known version of each game; returns how many matched
    pub fn apply_latest_versions(
        &self,
        index: &mut CollectionIndex,
        versions: &HashMap<TitleId, u32>,
    ) -> usize {
        let applied = versions
            .iter()
            .filter(|(id, version)| index.set_latest_version(**id, **version))
            .count();
        tracing::debug!("Applied {} of {} latest versions", applied, versions.len());
        applied
    }
}
