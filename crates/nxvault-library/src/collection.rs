//! The collection index: one entry per title ID
//!
//! Entries may be discovered out of order. A DLC seen before its game
//! creates a stub game that later loads merge into, so children attached to
//! the stub survive. The index has no internal locking and assumes a single
//! writer.

use crate::LibraryError;
use crate::identity::{TitleId, TitleKey};
use crate::title::{CollectionItem, CollectionState, Title, TitleKind, Update, strip_dlc_tag};
use std::collections::BTreeMap;

/// Fields merged into a game entry by [`CollectionIndex::upsert_game`]
///
/// `None` leaves the existing value alone.
#[derive(Debug, Clone, Default)]
pub struct GameFields {
    pub title_key: Option<TitleKey>,
    pub name: Option<String>,
    pub state: Option<CollectionState>,
    pub favorite: Option<bool>,
}

/// How the base game of an attached DLC was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlcAttachment {
    /// The base game was already indexed
    Existing,
    /// A stub game was synthesized for the forward reference
    StubCreated,
}

/// Owner of every collection entry
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionIndex {
    items: BTreeMap<TitleId, CollectionItem>,
}

impl CollectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: TitleId) -> bool {
        self.items.contains_key(&id)
    }

    /// All entries in ID order
    pub fn iter(&self) -> impl Iterator<Item = &CollectionItem> {
        self.items.values()
    }

    pub fn games(&self) -> impl Iterator<Item = &CollectionItem> {
        self.iter().filter(|item| item.title.game_info().is_some())
    }

    pub fn owned(&self) -> impl Iterator<Item = &CollectionItem> {
        self.iter().filter(|item| {
            matches!(
                item.state,
                CollectionState::Owned | CollectionState::OnSwitch
            )
        })
    }

    pub fn favorites(&self) -> impl Iterator<Item = &CollectionItem> {
        self.iter().filter(|item| item.favorite)
    }

    /// Exact-match lookup from a raw string
    ///
    /// Malformed IDs are simply absent.
    pub fn lookup(&self, id: &str) -> Option<&CollectionItem> {
        TitleId::parse(id).and_then(|id| self.get(id))
    }

    /// Lookup after normalizing an update or DLC ID to its base game
    pub fn lookup_base(&self, id: &str) -> Option<&CollectionItem> {
        TitleId::parse(id).and_then(|id| self.get_base(id))
    }

    pub fn get(&self, id: TitleId) -> Option<&CollectionItem> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: TitleId) -> Option<&mut CollectionItem> {
        self.items.get_mut(&id)
    }

    /// Owning game of any ID; indexed entries answer for IDs with no role digits
    pub fn get_base(&self, id: TitleId) -> Option<&CollectionItem> {
        id.base_game_id()
            .or_else(|| self.get(id).map(|item| item.title.base_id()))
            .and_then(|base| self.get(base))
    }

    /// Insert an entry, replacing and returning any previous one under the same ID
    ///
    /// Use [`upsert_game`](Self::upsert_game) when existing children must survive.
    pub fn insert(&mut self, item: CollectionItem) -> Option<CollectionItem> {
        self.items.insert(item.id(), item)
    }

    /// Merge fields into an existing entry or create a new game
    pub fn upsert_game(&mut self, id: TitleId, fields: GameFields) -> &mut CollectionItem {
        let item = self.items.entry(id).or_insert_with(|| {
            tracing::debug!("Creating game entry {}", id);
            CollectionItem::new(Title::game(id))
        });

        if let Some(key) = fields.title_key {
            item.title.title_key = Some(key);
        }
        if let Some(name) = fields.name {
            item.title.name = Some(name);
        }
        if let Some(state) = fields.state {
            item.state = state;
        }
        if let Some(favorite) = fields.favorite {
            item.favorite = favorite;
        }

        item
    }

    /// Attach a DLC to its base game, creating a stub game when needed
    ///
    /// The DLC is indexed as its own entry too. If it is already indexed, its
    /// name and key are refreshed and its collection state kept.
    pub fn attach_dlc(
        &mut self,
        base_id: TitleId,
        dlc: CollectionItem,
    ) -> (&CollectionItem, DlcAttachment) {
        let dlc_id = dlc.id();

        let attachment = if self.items.contains_key(&base_id) {
            DlcAttachment::Existing
        } else {
            let mut stub = Title::game(base_id);
            if let Some(name) = &dlc.title.name {
                stub.name = Some(strip_dlc_tag(name).to_string());
            }
            tracing::warn!(
                "DLC {} references unknown base game {}, creating stub",
                dlc_id,
                base_id
            );
            self.items.insert(base_id, CollectionItem::new(stub));
            DlcAttachment::StubCreated
        };

        if let Some(base) = self.items.get_mut(&base_id) {
            match base.title.game_info_mut() {
                Some(info) => {
                    info.add_dlc(dlc_id);
                }
                None => tracing::warn!(
                    "DLC {} references {} which is not a game",
                    dlc_id,
                    base_id
                ),
            }
        }

        match self.items.get_mut(&dlc_id) {
            Some(existing) => {
                if dlc.title.name.is_some() {
                    existing.title.name = dlc.title.name;
                }
                if dlc.title.title_key.is_some() {
                    existing.title.title_key = dlc.title.title_key;
                }
            }
            None => {
                self.items.insert(dlc_id, dlc);
            }
        }

        // The base entry was either found or inserted above
        let base = &self.items[&base_id];
        (base, attachment)
    }

    /// Append an update to its game
    ///
    /// Unlike DLC, an update whose game is unknown is not given a stub; the
    /// index is left untouched and the orphan is reported.
    pub fn attach_update(&mut self, update: Update) -> Result<(), LibraryError> {
        let Some(base) = self.items.get_mut(&update.game_id) else {
            return Err(LibraryError::OrphanUpdate {
                update: update.id,
                game: update.game_id,
            });
        };

        match &mut base.title.kind {
            TitleKind::Game(info) => {
                tracing::debug!(
                    "Attaching update {} v{} to {}",
                    update.id,
                    update.version,
                    update.game_id
                );
                info.add_update(update);
                Ok(())
            }
            _ => Err(LibraryError::NotAGame(update.game_id)),
        }
    }

    /// Returns false when the ID is unknown
    pub fn set_favorite(&mut self, id: TitleId, favorite: bool) -> bool {
        match self.items.get_mut(&id) {
            Some(item) => {
                item.favorite = favorite;
                true
            }
            None => false,
        }
    }

    /// Record the latest known version of each game
    pub fn set_latest_version(&mut self, id: TitleId, version: u32) -> bool {
        match self.get_mut(id).and_then(|item| item.title.game_info_mut()) {
            Some(info) => {
                info.latest_version = Some(version);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TitleId {
        s.parse().unwrap()
    }

    const GAME: &str = "0100ABCD00000000";
    const UPDATE: &str = "0100ABCD00000800";
    const DLC1: &str = "0100ABCD00001001";
    const DLC2: &str = "0100ABCD00001002";

    fn dlc_item(dlc: &str, name: &str) -> CollectionItem {
        CollectionItem::new(Title::dlc(id(dlc), id(GAME)).with_name(name))
    }

    #[test]
    fn test_lookup_rejects_malformed() {
        let mut index = CollectionIndex::new();
        index.upsert_game(id(GAME), GameFields::default());

        assert!(index.lookup(GAME).is_some());
        assert!(index.lookup(&GAME.to_lowercase()).is_some());
        assert!(index.lookup("0100ABCD").is_none());
        assert!(index.lookup("").is_none());
        assert!(index.lookup(UPDATE).is_none());
    }

    #[test]
    fn test_lookup_base_normalizes() {
        let mut index = CollectionIndex::new();
        index.upsert_game(id(GAME), GameFields::default());

        assert_eq!(index.lookup_base(UPDATE).unwrap().id(), id(GAME));
        assert_eq!(index.lookup_base(DLC1).unwrap().id(), id(GAME));
        assert_eq!(index.lookup_base(GAME).unwrap().id(), id(GAME));
    }

    #[test]
    fn test_insert_overwrites() {
        let mut index = CollectionIndex::new();
        let first = CollectionItem::new(Title::game(id(GAME)).with_name("First"));
        let second = CollectionItem::new(Title::game(id(GAME)).with_name("Second"));

        assert!(index.insert(first).is_none());
        let previous = index.insert(second).unwrap();

        assert_eq!(previous.title.name.as_deref(), Some("First"));
        assert_eq!(index.len(), 1);
        assert_eq!(
            index.get(id(GAME)).unwrap().title.name.as_deref(),
            Some("Second")
        );
    }

    #[test]
    fn test_upsert_merges_only_supplied_fields() {
        let mut index = CollectionIndex::new();
        index.upsert_game(
            id(GAME),
            GameFields {
                name: Some("Game".into()),
                favorite: Some(true),
                ..Default::default()
            },
        );
        index.upsert_game(
            id(GAME),
            GameFields {
                state: Some(CollectionState::Owned),
                ..Default::default()
            },
        );

        let item = index.get(id(GAME)).unwrap();
        assert_eq!(item.title.name.as_deref(), Some("Game"));
        assert!(item.favorite);
        assert_eq!(item.state, CollectionState::Owned);
    }

    #[test]
    fn test_attach_dlc_creates_single_stub() {
        let mut index = CollectionIndex::new();

        let (base, attachment) = index.attach_dlc(id(GAME), dlc_item(DLC1, "[DLC] Game Pack"));
        assert_eq!(attachment, DlcAttachment::StubCreated);
        assert_eq!(base.title.name.as_deref(), Some("Game Pack"));

        let (_, attachment) = index.attach_dlc(id(GAME), dlc_item(DLC2, "[DLC] Game Pack 2"));
        assert_eq!(attachment, DlcAttachment::Existing);

        let games: Vec<_> = index.games().collect();
        assert_eq!(games.len(), 1);
        let info = games[0].title.game_info().unwrap();
        assert_eq!(info.dlc, vec![id(DLC1), id(DLC2)]);
        assert!(index.get(id(DLC1)).is_some());
        assert!(index.get(id(DLC2)).is_some());
    }

    #[test]
    fn test_upsert_after_stub_preserves_dlc() {
        let mut index = CollectionIndex::new();
        index.attach_dlc(id(GAME), dlc_item(DLC1, "[DLC] Pack"));

        index.upsert_game(
            id(GAME),
            GameFields {
                name: Some("Real Game".into()),
                title_key: TitleKey::parse("0123456789ABCDEF0123456789ABCDEF"),
                ..Default::default()
            },
        );

        let game = index.get(id(GAME)).unwrap();
        assert_eq!(game.title.name.as_deref(), Some("Real Game"));
        assert!(game.title.title_key.is_some());
        assert_eq!(game.title.game_info().unwrap().dlc, vec![id(DLC1)]);
    }

    #[test]
    fn test_attach_dlc_twice_keeps_state() {
        let mut index = CollectionIndex::new();
        index.attach_dlc(id(GAME), dlc_item(DLC1, "Pack"));
        index.get_mut(id(DLC1)).unwrap().state = CollectionState::Owned;

        index.attach_dlc(id(GAME), dlc_item(DLC1, "Pack Renamed"));

        let dlc = index.get(id(DLC1)).unwrap();
        assert_eq!(dlc.state, CollectionState::Owned);
        assert_eq!(dlc.title.name.as_deref(), Some("Pack Renamed"));
        assert_eq!(
            index.get(id(GAME)).unwrap().title.game_info().unwrap().dlc.len(),
            1
        );
    }

    #[test]
    fn test_attach_update_orphan_leaves_index_untouched() {
        let mut index = CollectionIndex::new();
        let before = index.len();

        let err = index
            .attach_update(Update::new(id(UPDATE), id(GAME), 0x10000))
            .unwrap_err();

        assert!(matches!(err, LibraryError::OrphanUpdate { .. }));
        assert_eq!(index.len(), before);
        assert!(index.get(id(GAME)).is_none());
    }

    #[test]
    fn test_attach_update_to_non_game() {
        let mut index = CollectionIndex::new();
        index.insert(dlc_item(DLC1, "Pack"));

        let err = index
            .attach_update(Update::new(id(UPDATE), id(DLC1), 0x10000))
            .unwrap_err();
        assert!(matches!(err, LibraryError::NotAGame(_)));
    }

    #[test]
    fn test_attach_update() {
        let mut index = CollectionIndex::new();
        index.upsert_game(id(GAME), GameFields::default());

        index
            .attach_update(Update::new(id(UPDATE), id(GAME), 0x20000))
            .unwrap();
        index
            .attach_update(Update::new(id(UPDATE), id(GAME), 0x10000))
            .unwrap();

        let info = index.get(id(GAME)).unwrap().title.game_info().unwrap();
        assert_eq!(info.updates.len(), 2);
        assert_eq!(info.updates[0].version, 0x10000);
    }

    #[test]
    fn test_queries() {
        let mut index = CollectionIndex::new();
        index.upsert_game(
            id(GAME),
            GameFields {
                state: Some(CollectionState::Owned),
                ..Default::default()
            },
        );
        index.attach_dlc(id(GAME), dlc_item(DLC1, "Pack"));

        assert_eq!(index.owned().count(), 1);
        assert_eq!(index.favorites().count(), 0);
        assert!(index.set_favorite(id(DLC1), true));
        assert!(!index.set_favorite(id(UPDATE), true));
        assert_eq!(index.favorites().count(), 1);

        assert!(index.set_latest_version(id(GAME), 0x30000));
        assert!(!index.set_latest_version(id(DLC1), 0x30000));
    }
}
