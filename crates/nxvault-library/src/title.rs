//! Titles and collection entries

use crate::identity::{TitleId, TitleKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Name prefix marking a DLC in key lists and archive names
pub const DLC_TAG: &str = "[DLC]";

/// Prefix marking an update in archive names
pub const UPDATE_TAG: &str = "[UPD]";

/// An update attached to its base game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub id: TitleId,
    pub game_id: TitleId,
    pub version: u32,
    pub title_key: Option<TitleKey>,
    pub rom_path: Option<PathBuf>,
}

impl Update {
    pub fn new(id: TitleId, game_id: TitleId, version: u32) -> Self {
        Self {
            id,
            game_id,
            version,
            title_key: None,
            rom_path: None,
        }
    }
}

/// Game-only data: updates ordered by version and DLC in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    pub updates: Vec<Update>,
    pub dlc: Vec<TitleId>,
    pub latest_version: Option<u32>,
}

impl GameInfo {
    /// Insert keeping version order; an update at a known version replaces it
    pub fn add_update(&mut self, update: Update) {
        match self
            .updates
            .binary_search_by_key(&update.version, |u| u.version)
        {
            Ok(pos) => self.updates[pos] = update,
            Err(pos) => self.updates.insert(pos, update),
        }
    }

    /// Returns false when the DLC was already listed
    pub fn add_dlc(&mut self, id: TitleId) -> bool {
        if self.dlc.contains(&id) {
            return false;
        }
        self.dlc.push(id);
        true
    }

    pub fn update(&self, version: u32) -> Option<&Update> {
        self.updates.iter().find(|u| u.version == version)
    }

    /// Highest version on record, falling back to the attached updates
    pub fn newest_version(&self) -> u32 {
        let attached = self.updates.last().map_or(0, |u| u.version);
        self.latest_version.unwrap_or(0).max(attached)
    }
}

/// Variant data of a title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TitleKind {
    Game(GameInfo),
    Dlc { game_id: TitleId },
    Update { game_id: TitleId, version: u32 },
}

/// Flat discriminant of [`TitleKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleType {
    Game,
    Dlc,
    Update,
}

impl TitleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TitleType::Game => "game",
            TitleType::Dlc => "dlc",
            TitleType::Update => "update",
        }
    }
}

impl FromStr for TitleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "game" => Ok(TitleType::Game),
            "dlc" => Ok(TitleType::Dlc),
            "update" => Ok(TitleType::Update),
            other => Err(format!("unknown title type '{}'", other)),
        }
    }
}

/// Any catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    pub id: TitleId,
    pub name: Option<String>,
    pub title_key: Option<TitleKey>,
    pub kind: TitleKind,
}

impl Title {
    pub fn game(id: TitleId) -> Self {
        Self {
            id,
            name: None,
            title_key: None,
            kind: TitleKind::Game(GameInfo::default()),
        }
    }

    pub fn dlc(id: TitleId, game_id: TitleId) -> Self {
        Self {
            id,
            name: None,
            title_key: None,
            kind: TitleKind::Dlc { game_id },
        }
    }

    /// Standalone title for an attached update, named after its game
    pub fn from_update(update: &Update, name: Option<String>) -> Self {
        Self {
            id: update.id,
            name,
            title_key: update.title_key.clone(),
            kind: TitleKind::Update {
                game_id: update.game_id,
                version: update.version,
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_key(mut self, key: Option<TitleKey>) -> Self {
        self.title_key = key;
        self
    }

    pub fn title_type(&self) -> TitleType {
        match self.kind {
            TitleKind::Game(_) => TitleType::Game,
            TitleKind::Dlc { .. } => TitleType::Dlc,
            TitleKind::Update { .. } => TitleType::Update,
        }
    }

    pub fn game_info(&self) -> Option<&GameInfo> {
        match &self.kind {
            TitleKind::Game(info) => Some(info),
            _ => None,
        }
    }

    pub fn game_info_mut(&mut self) -> Option<&mut GameInfo> {
        match &mut self.kind {
            TitleKind::Game(info) => Some(info),
            _ => None,
        }
    }

    /// Owning base game, or the title itself for a game
    pub fn base_id(&self) -> TitleId {
        match self.kind {
            TitleKind::Game(_) => self.id,
            TitleKind::Dlc { game_id } | TitleKind::Update { game_id, .. } => game_id,
        }
    }

    /// Name for display, falling back to the ID
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }
}

/// Collection state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionState {
    #[default]
    NotOwned,
    Owned,
    OnSwitch,
    New,
}

impl CollectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionState::NotOwned => "not_owned",
            CollectionState::Owned => "owned",
            CollectionState::OnSwitch => "on_switch",
            CollectionState::New => "new",
        }
    }
}

impl fmt::Display for CollectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "not_owned" | "notowned" => Ok(CollectionState::NotOwned),
            "owned" => Ok(CollectionState::Owned),
            "on_switch" | "onswitch" => Ok(CollectionState::OnSwitch),
            "new" => Ok(CollectionState::New),
            other => Err(format!("unknown collection state '{}'", other)),
        }
    }
}

/// A title plus its collection-specific state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub title: Title,
    pub state: CollectionState,
    pub favorite: bool,
    pub rom_path: Option<PathBuf>,
    pub size: u64,
}

impl CollectionItem {
    pub fn new(title: Title) -> Self {
        Self {
            title,
            state: CollectionState::NotOwned,
            favorite: false,
            rom_path: None,
            size: 0,
        }
    }

    pub fn with_state(mut self, state: CollectionState) -> Self {
        self.state = state;
        self
    }

    pub fn id(&self) -> TitleId {
        self.title.id
    }

    /// Record a local file, promoting to `Owned` unless already on the console
    pub fn mark_local(&mut self, path: PathBuf, size: Option<u64>) {
        self.rom_path = Some(path);
        if let Some(size) = size {
            self.size = size;
        }
        if self.state != CollectionState::OnSwitch {
            self.state = CollectionState::Owned;
        }
    }
}

/// Strip a leading DLC marker from a name
pub fn strip_dlc_tag(name: &str) -> &str {
    name.strip_prefix(DLC_TAG).map_or(name, str::trim_start)
}

/// Whether a name carries the DLC marker
pub fn has_dlc_tag(name: &str) -> bool {
    name.trim_start().starts_with(DLC_TAG)
}
