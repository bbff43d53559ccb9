//! Persisted metadata overlay using SQLite
//!
//! Holds the per-title state that key lists cannot supply: favorites, local
//! paths, collection state, sizes and attached updates.

use crate::LibraryError;
use crate::identity::{TitleId, TitleKey};
use crate::title::{CollectionItem, CollectionState, TitleKind, TitleType, Update};
use rusqlite::{Connection, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// An update stored under its game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayUpdate {
    pub id: TitleId,
    pub version: u32,
    pub title_key: Option<TitleKey>,
    pub rom_path: Option<PathBuf>,
}

/// Persisted fields of one title; everything but the ID is optional
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayRecord {
    pub id: TitleId,
    pub name: Option<String>,
    pub title_key: Option<TitleKey>,
    pub title_type: Option<TitleType>,
    pub base_id: Option<TitleId>,
    pub state: Option<CollectionState>,
    pub favorite: Option<bool>,
    pub rom_path: Option<PathBuf>,
    pub size: Option<u64>,
    pub updates: Vec<OverlayUpdate>,
}

impl OverlayRecord {
    /// A record carrying nothing but its identity
    pub fn new(id: TitleId) -> Self {
        Self {
            id,
            name: None,
            title_key: None,
            title_type: None,
            base_id: None,
            state: None,
            favorite: None,
            rom_path: None,
            size: None,
            updates: Vec::new(),
        }
    }

    /// Snapshot of a collection entry
    pub fn from_item(item: &CollectionItem) -> Self {
        let title = &item.title;
        let base_id = match title.kind {
            TitleKind::Game(_) => None,
            _ => Some(title.base_id()),
        };
        let updates = title
            .game_info()
            .map(|info| {
                info.updates
                    .iter()
                    .map(|u| OverlayUpdate {
                        id: u.id,
                        version: u.version,
                        title_key: u.title_key.clone(),
                        rom_path: u.rom_path.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: title.id,
            name: title.name.clone(),
            title_key: title.title_key.clone(),
            title_type: Some(title.title_type()),
            base_id,
            state: Some(item.state),
            favorite: Some(item.favorite),
            rom_path: item.rom_path.clone(),
            size: Some(item.size),
            updates,
        }
    }
}

impl OverlayUpdate {
    pub fn into_update(self, game_id: TitleId) -> Update {
        Update {
            id: self.id,
            game_id,
            version: self.version,
            title_key: self.title_key,
            rom_path: self.rom_path,
        }
    }
}

/// Overlay database manager
pub struct OverlayStore {
    conn: Connection,
}

impl OverlayStore {
    /// Open or create an overlay database
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let conn = Connection::open(path)?;

        let store = Self { conn };
        store.init_schema()?;

        Ok(store)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, LibraryError> {
        let conn = Connection::open_in_memory()?;

        let store = Self { conn };
        store.init_schema()?;

        Ok(store)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), LibraryError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS titles (
                id TEXT PRIMARY KEY,
                name TEXT,
                title_key TEXT,
                kind TEXT,
                base_id TEXT,
                state TEXT,
                favorite INTEGER,
                rom_path TEXT,
                size INTEGER,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS updates (
                id TEXT NOT NULL,
                game_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                title_key TEXT,
                rom_path TEXT,
                PRIMARY KEY (game_id, version)
            );

            CREATE INDEX IF NOT EXISTS idx_updates_game ON updates(game_id);
        "#,
        )?;

        Ok(())
    }

    /// Replace the stored overlay with the given records
    pub fn save_records(&mut self, records: &[OverlayRecord]) -> Result<usize, LibraryError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM updates", [])?;
        tx.execute("DELETE FROM titles", [])?;

        let mut saved = 0;
        {
            let mut title_stmt = tx.prepare(
                r#"INSERT OR REPLACE INTO titles
                   (id, name, title_key, kind, base_id, state, favorite, rom_path, size, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, CURRENT_TIMESTAMP)"#,
            )?;
            let mut update_stmt = tx.prepare(
                r#"INSERT OR REPLACE INTO updates (id, game_id, version, title_key, rom_path)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#,
            )?;

            for record in records {
                let id = record.id;
                title_stmt.execute(params![
                    id.to_string(),
                    record.name,
                    record.title_key.as_ref().map(TitleKey::as_str),
                    record.title_type.map(|t| t.as_str()),
                    record.base_id.map(|b| b.to_string()),
                    record.state.map(|s| s.as_str()),
                    record.favorite,
                    record.rom_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                    record.size.map(|s| i64::try_from(s).unwrap_or(i64::MAX)),
                ])?;

                for update in &record.updates {
                    update_stmt.execute(params![
                        update.id.to_string(),
                        id.to_string(),
                        update.version,
                        update.title_key.as_ref().map(TitleKey::as_str),
                        update
                            .rom_path
                            .as_ref()
                            .map(|p| p.to_string_lossy().to_string()),
                    ])?;
                }
                saved += 1;
            }
        }

        tx.commit()?;
        Ok(saved)
    }

    /// Persist every entry of a collection
    pub fn save_items<'a>(
        &mut self,
        items: impl IntoIterator<Item = &'a CollectionItem>,
    ) -> Result<usize, LibraryError> {
        let records: Vec<OverlayRecord> = items.into_iter().map(OverlayRecord::from_item).collect();
        self.save_records(&records)
    }

    /// Load every stored record with its updates
    pub fn load_records(&self) -> Result<Vec<OverlayRecord>, LibraryError> {
        let mut updates = self.load_updates()?;

        let mut stmt = self.conn.prepare(
            "SELECT id, name, title_key, kind, base_id, state, favorite, rom_path, size FROM titles ORDER BY id",
        )?;
        let mut records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        for record in &mut records {
            if let Some(list) = updates.remove(&record.id) {
                record.updates = list;
            }
        }

        // Updates whose game row is gone still reach the loader
        for (game_id, list) in updates {
            let mut record = OverlayRecord::new(game_id);
            record.updates = list;
            records.push(record);
        }

        Ok(records)
    }

    /// Number of stored titles
    pub fn title_count(&self) -> Result<i64, LibraryError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM titles", [], |row| row.get(0))?;
        Ok(count)
    }

    fn load_updates(&self) -> Result<HashMap<TitleId, Vec<OverlayUpdate>>, LibraryError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, game_id, version, title_key, rom_path FROM updates ORDER BY game_id, version",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let update = OverlayUpdate {
                    id: parse_column(row, 0)?,
                    version: row.get(2)?,
                    title_key: parse_optional_column(row, 3)?,
                    rom_path: row.get::<_, Option<String>>(4)?.map(PathBuf::from),
                };
                let game_id: TitleId = parse_column(row, 1)?;
                Ok((game_id, update))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_game: HashMap<TitleId, Vec<OverlayUpdate>> = HashMap::new();
        for (game_id, update) in rows {
            by_game.entry(game_id).or_default().push(update);
        }
        Ok(by_game)
    }

    /// Convert a row to an OverlayRecord
    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<OverlayRecord> {
        Ok(OverlayRecord {
            id: parse_column(row, 0)?,
            name: row.get(1)?,
            title_key: parse_optional_column(row, 2)?,
            title_type: parse_optional_column(row, 3)?,
            base_id: parse_optional_column(row, 4)?,
            state: parse_optional_column(row, 5)?,
            favorite: row.get(6)?,
            rom_path: row.get::<_, Option<String>>(7)?.map(PathBuf::from),
            size: row
                .get::<_, Option<i64>>(8)?
                .map(|s| u64::try_from(s).unwrap_or(0)),
            updates: Vec::new(),
        })
    }
}

fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.get(idx)?;
    parse_text(idx, &raw)
}

fn parse_optional_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) if !raw.is_empty() => parse_text(idx, &raw).map(Some),
        _ => Ok(None),
    }
}

fn parse_text<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid value '{}': {}", raw, e).into(),
        )
    })
}
