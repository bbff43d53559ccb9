//! Title catalog for nxvault
//!
//! Indexes base games, DLC and updates from title key lists, a persisted
//! metadata overlay and local archive files.

mod collection;
mod filename;
mod identity;
mod keyfile;
mod loader;
mod overlay;
mod scanner;
mod title;

pub use collection::{CollectionIndex, DlcAttachment, GameFields};
pub use filename::{
    ArchiveKind, ArchiveName, canonical_archive_name, parse_archive_name, sanitize_file_name,
};
pub use identity::{
    IdRole, IdentityError, TITLE_ID_LEN, TITLE_KEY_LEN, TitleId, TitleKey, UPDATE_OFFSET,
    VERSION_STRIDE, is_base_game_id, is_dlc_id, is_update_id,
};
pub use keyfile::{KeyEntry, parse_key_line};
pub use loader::{LibraryLoader, LoadReport};
pub use overlay::{OverlayRecord, OverlayStore, OverlayUpdate};
pub use scanner::{ArchiveScanner, ScanConfig, ScanResult, ScannedFile};
pub use title::{
    CollectionItem, CollectionState, DLC_TAG, GameInfo, Title, TitleKind, TitleType, UPDATE_TAG,
    Update, has_dlc_tag, strip_dlc_tag,
};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Invalid key list line: {0}")]
    InvalidKeyLine(String),

    #[error("Invalid archive name: {0}")]
    InvalidFileName(String),

    #[error("Update {update} references unknown game {game}")]
    OrphanUpdate { update: TitleId, game: TitleId },

    #[error("Title {0} is not a game")]
    NotAGame(TitleId),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
