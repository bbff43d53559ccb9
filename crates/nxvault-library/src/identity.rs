//! Title identifiers and the relationships encoded in them
//!
//! A title ID is 16 hex digits. The low 13 bits give the role of a title
//! relative to its base game:
//!
//! - base game: all 13 bits clear (`...0000`, `...2000`, `...E000`)
//! - update: the base ID plus [`UPDATE_OFFSET`] (`...0800`)
//! - DLC: bit 12 set plus a slot index starting at 1 (`...1001`, `...1002`)
//!
//! Every derivation here is a pure bit operation, no lookup involved.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of hex digits in a title ID
pub const TITLE_ID_LEN: usize = 16;

/// Number of hex digits in a title key
pub const TITLE_KEY_LEN: usize = 32;

/// Offset of the update channel from its base game
pub const UPDATE_OFFSET: u64 = 0x800;

/// Bit marking a DLC slot
const DLC_FLAG: u64 = 0x1000;

/// Role bits of an ID
const ROLE_MASK: u64 = 0x1FFF;

/// DLC slot index bits
const DLC_INDEX_MASK: u64 = 0x0FFF;

/// Versions always move in steps of this size
pub const VERSION_STRIDE: u32 = 0x10000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Invalid title ID '{0}': expected {TITLE_ID_LEN} hex digits")]
    InvalidTitleId(String),

    #[error("Invalid title key: expected {TITLE_KEY_LEN} hex digits")]
    InvalidTitleKey,

    #[error("{id} is not {expected} ID")]
    WrongKind { id: TitleId, expected: &'static str },
}

/// Role of a title ID relative to its base game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdRole {
    BaseGame,
    Update,
    Dlc,
    Unknown,
}

/// A 16 hex digit title identifier
///
/// Parsing is case-insensitive, display is always upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TitleId(u64);

impl TitleId {
    /// Parse an ID, returning `None` on wrong length or non-hex input
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() != TITLE_ID_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(s, 16).ok().map(Self)
    }

    /// Role encoded in the trailing digits
    pub fn role(self) -> IdRole {
        let role = self.0 & ROLE_MASK;
        if role == 0 {
            IdRole::BaseGame
        } else if role == UPDATE_OFFSET {
            IdRole::Update
        } else if role & DLC_FLAG != 0 && role & DLC_INDEX_MASK != 0 {
            IdRole::Dlc
        } else {
            IdRole::Unknown
        }
    }

    pub fn is_base_game(self) -> bool {
        self.role() == IdRole::BaseGame
    }

    pub fn is_update(self) -> bool {
        self.role() == IdRole::Update
    }

    pub fn is_dlc(self) -> bool {
        self.role() == IdRole::Dlc
    }

    /// Base game owning this update
    pub fn base_game_from_update(self) -> Result<Self, IdentityError> {
        if !self.is_update() {
            return Err(IdentityError::WrongKind {
                id: self,
                expected: "an update",
            });
        }
        Ok(Self(self.0 & !ROLE_MASK))
    }

    /// Base game owning this DLC
    pub fn base_game_from_dlc(self) -> Result<Self, IdentityError> {
        if !self.is_dlc() {
            return Err(IdentityError::WrongKind {
                id: self,
                expected: "a DLC",
            });
        }
        Ok(Self(self.0 & !ROLE_MASK))
    }

    /// Update channel of this base game
    pub fn update_from_base_game(self) -> Result<Self, IdentityError> {
        if !self.is_base_game() {
            return Err(IdentityError::WrongKind {
                id: self,
                expected: "a base game",
            });
        }
        Ok(Self(self.0 | UPDATE_OFFSET))
    }

    /// Normalize any base, update or DLC ID to its base game
    ///
    /// Returns `None` for IDs whose role digits match none of the three.
    pub fn base_game_id(self) -> Option<Self> {
        match self.role() {
            IdRole::BaseGame => Some(self),
            IdRole::Update | IdRole::Dlc => Some(Self(self.0 & !ROLE_MASK)),
            IdRole::Unknown => None,
        }
    }

    /// Base game slot of any ID, whatever its role digits say
    ///
    /// For titles typed by other means (a DLC marker in the name) whose
    /// digits match no role.
    pub fn owning_base(self) -> Self {
        Self(self.0 & !ROLE_MASK)
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl FromStr for TitleId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| IdentityError::InvalidTitleId(s.to_string()))
    }
}

impl Serialize for TitleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TitleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A 32 hex digit title key, stored upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TitleKey(String);

impl TitleKey {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() != TITLE_KEY_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(s.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TitleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TitleKey {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(IdentityError::InvalidTitleKey)
    }
}

impl TryFrom<String> for TitleKey {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(IdentityError::InvalidTitleKey)
    }
}

impl From<TitleKey> for String {
    fn from(key: TitleKey) -> Self {
        key.0
    }
}

/// Classify a raw string as a base game ID, failing closed on bad input
pub fn is_base_game_id(id: &str) -> bool {
    TitleId::parse(id).is_some_and(TitleId::is_base_game)
}

/// Classify a raw string as an update ID, failing closed on bad input
pub fn is_update_id(id: &str) -> bool {
    TitleId::parse(id).is_some_and(TitleId::is_update)
}

/// Classify a raw string as a DLC ID, failing closed on bad input
pub fn is_dlc_id(id: &str) -> bool {
    TitleId::parse(id).is_some_and(TitleId::is_dlc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TitleId {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(id("0100abcd00000800"), id("0100ABCD00000800"));
        assert_eq!(id("0100abcd00000800").to_string(), "0100ABCD00000800");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(TitleId::parse("0100ABCD0000080").is_none());
        assert!(TitleId::parse("0100ABCD000008000").is_none());
        assert!(TitleId::parse("0100ABCD0000080G").is_none());
        assert!(TitleId::parse("").is_none());
        assert!("+100ABCD00000800".parse::<TitleId>().is_err());
    }

    #[test]
    fn test_classification() {
        assert!(is_base_game_id("0100ABCD00000000"));
        assert!(is_base_game_id("01007EF00011E000"));
        assert!(is_update_id("0100ABCD00000800"));
        assert!(is_update_id("01007EF00011E800"));
        assert!(is_dlc_id("0100ABCD00001001"));
        assert!(is_dlc_id("01007EF00011F002"));

        assert!(!is_dlc_id("0100ABCD00000000"));
        assert!(!is_update_id("0100ABCD00001001"));
        assert!(!is_base_game_id("0100ABCD00000800"));
    }

    #[test]
    fn test_classification_fails_closed() {
        for bad in ["", "0100", "0100ABCD000000000", "ZZZZABCD00000000"] {
            assert!(!is_base_game_id(bad), "{bad}");
            assert!(!is_update_id(bad), "{bad}");
            assert!(!is_dlc_id(bad), "{bad}");
        }
        // Bit 12 set without a slot index matches no role
        assert_eq!(id("0100ABCD00001000").role(), IdRole::Unknown);
    }

    #[test]
    fn test_update_round_trip() {
        for raw in [
            "0100ABCD00000000",
            "01007EF00011E000",
            "0100000000010000",
            "FFFFFFFFFFFFE000",
        ] {
            let base = id(raw);
            let update = base.update_from_base_game().unwrap();
            assert!(update.is_update());
            assert_eq!(update.base_game_from_update().unwrap(), base);
        }
    }

    #[test]
    fn test_base_from_dlc() {
        assert_eq!(
            id("01007EF00011F001").base_game_from_dlc().unwrap(),
            id("01007EF00011E000")
        );
        assert_eq!(
            id("0100ABCD00001005").base_game_from_dlc().unwrap(),
            id("0100ABCD00000000")
        );
    }

    #[test]
    fn test_owning_base_ignores_role() {
        let base = id("0100ABCD00000000");
        assert_eq!(id("0100ABCD00000801").base_game_id(), None);
        assert_eq!(id("0100ABCD00000801").owning_base(), base);
        assert_eq!(id("0100ABCD00001002").owning_base(), base);
        assert_eq!(base.owning_base(), base);
    }

    #[test]
    fn test_derivation_on_wrong_kind() {
        let base = id("0100ABCD00000000");
        let update = id("0100ABCD00000800");

        assert!(matches!(
            base.base_game_from_update(),
            Err(IdentityError::WrongKind { .. })
        ));
        assert!(base.base_game_from_dlc().is_err());
        assert!(update.update_from_base_game().is_err());
    }

    #[test]
    fn test_base_game_id_normalization() {
        let base = id("0100ABCD00000000");
        assert_eq!(base.base_game_id(), Some(base));
        assert_eq!(id("0100ABCD00000800").base_game_id(), Some(base));
        assert_eq!(id("0100ABCD00001003").base_game_id(), Some(base));
        assert_eq!(id("0100ABCD00000123").base_game_id(), None);
    }

    #[test]
    fn test_title_key() {
        let key = TitleKey::parse("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(key.as_str(), "0123456789ABCDEF0123456789ABCDEF");
        assert!(TitleKey::parse("0123").is_none());
        assert!(TitleKey::parse("").is_none());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&id("0100abcd00000800")).unwrap();
        assert_eq!(json, "\"0100ABCD00000800\"");
        let back: TitleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id("0100ABCD00000800"));
    }
}
