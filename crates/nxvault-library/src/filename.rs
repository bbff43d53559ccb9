//! Archive file name grammar
//!
//! ```text
//! [DLC] Name Of Pack [0100ABCD00001001][v0].nsp
//! Name Of Game [UPD][0100ABCD00000800][v65536].nsp
//! Name Of Game [0100ABCD00000000][v0].nsp
//! ```
//!
//! The last whitespace-separated token is the meta token holding the ID and
//! version. Repacked archives are named with [`canonical_archive_name`], so
//! everything this crate writes can be read back by [`parse_archive_name`].

use crate::LibraryError;
use crate::identity::TitleId;
use crate::title::{DLC_TAG, TitleType, UPDATE_TAG};
use std::path::Path;

const GROUP_SEPARATOR: &str = "][";

/// Characters that may not appear in a file name
const ILLEGAL_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// What an archive name says it contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Game,
    Demo,
    Dlc,
    Update,
}

/// A successfully parsed archive name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub kind: ArchiveKind,
    pub name: String,
    pub id: TitleId,
    pub version: u32,
}

/// Parse a file name (with or without directories and extension)
pub fn parse_archive_name(file_name: &str) -> Result<ArchiveName, LibraryError> {
    let invalid = || LibraryError::InvalidFileName(file_name.to_string());

    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(invalid)?;

    let tokens: Vec<&str> = stem.split_whitespace().collect();
    let Some((&meta, rest)) = tokens.split_last() else {
        return Err(invalid());
    };

    let (mut kind, name_tokens) = match rest.split_first() {
        Some((&first, between)) if first == DLC_TAG => (ArchiveKind::Dlc, between),
        _ if is_demo(rest) => (ArchiveKind::Demo, rest),
        _ => (ArchiveKind::Game, rest),
    };

    let meta = match meta.strip_prefix(UPDATE_TAG) {
        Some(stripped) if kind != ArchiveKind::Dlc => {
            kind = ArchiveKind::Update;
            stripped
        }
        _ => meta,
    };

    let (id, version) = parse_meta(meta).ok_or_else(invalid)?;

    Ok(ArchiveName {
        kind,
        name: name_tokens.join(" "),
        id,
        version,
    })
}

/// `[ID][vVERSION]`
fn parse_meta(meta: &str) -> Option<(TitleId, u32)> {
    let (id_group, version_group) = meta.split_once(GROUP_SEPARATOR)?;

    let id = id_group.strip_prefix('[')?;
    let version = version_group.strip_suffix(']')?;
    let version = version.strip_prefix('v').unwrap_or(version);

    Some((TitleId::parse(id)?, version.parse().ok()?))
}

fn is_demo(tokens: &[&str]) -> bool {
    tokens.iter().any(|token| {
        token
            .trim_matches(|c| matches!(c, '(' | ')' | '[' | ']'))
            .eq_ignore_ascii_case("demo")
    })
}

/// Remove characters that are illegal in file names and collapse whitespace
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && !c.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Name a repacked archive so it round-trips through [`parse_archive_name`]
pub fn canonical_archive_name(
    title_type: TitleType,
    name: &str,
    id: TitleId,
    version: u32,
    extension: &str,
) -> String {
    let name = sanitize_file_name(name);
    let mut file_name = String::new();

    if title_type == TitleType::Dlc && !name.starts_with(DLC_TAG) {
        file_name.push_str(DLC_TAG);
        file_name.push(' ');
    }
    file_name.push_str(&name);
    file_name.push(' ');
    if title_type == TitleType::Update {
        file_name.push_str(UPDATE_TAG);
    }

    format!(
        "{}[{}][v{}].{}",
        file_name,
        id,
        version,
        extension.trim_start_matches('.')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update() {
        let parsed = parse_archive_name("Some Game [UPD][0100ABCD00000800][v65536].nsp").unwrap();
        assert_eq!(parsed.kind, ArchiveKind::Update);
        assert_eq!(parsed.name, "Some Game");
        assert_eq!(parsed.id.to_string(), "0100ABCD00000800");
        assert_eq!(parsed.version, 65536);
    }

    #[test]
    fn test_parse_dlc() {
        let parsed = parse_archive_name("[DLC] Some Game DLC [0100ABCD00000801][v0].nsp").unwrap();
        assert_eq!(parsed.kind, ArchiveKind::Dlc);
        assert_eq!(parsed.name, "Some Game DLC");
        assert_eq!(parsed.id.to_string(), "0100ABCD00000801");
        assert_eq!(parsed.version, 0);
    }

    #[test]
    fn test_parse_game_and_demo() {
        let parsed = parse_archive_name("Some Game [0100ABCD00000000][v0].xci").unwrap();
        assert_eq!(parsed.kind, ArchiveKind::Game);
        assert_eq!(parsed.name, "Some Game");

        let parsed = parse_archive_name("Some Game Demo [0100ABCD00002000][v0].nsp").unwrap();
        assert_eq!(parsed.kind, ArchiveKind::Demo);

        let parsed = parse_archive_name("Demolition Derby [0100ABCD00002000][v0].nsp").unwrap();
        assert_eq!(parsed.kind, ArchiveKind::Game);
    }

    #[test]
    fn test_parse_with_directory() {
        let parsed =
            parse_archive_name("/roms/switch/Some Game [0100ABCD00000000][v0].nsp").unwrap();
        assert_eq!(parsed.name, "Some Game");
    }

    #[test]
    fn test_parse_rejects_bad_names() {
        for name in [
            "",
            "Some Game.nsp",
            "Some Game [0100ABCD00000000].nsp",
            "Some Game [0100ABCD][v0].nsp",
            "Some Game [0100ABCD00000000][vX].nsp",
            "Some Game 0100ABCD00000000][v0].nsp",
        ] {
            assert!(parse_archive_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_file_name("Game: The \"Sequel\"?"), "Game The Sequel");
        assert_eq!(sanitize_file_name("A/B\\C  |  D"), "ABC D");
    }

    #[test]
    fn test_canonical_names() {
        let game: TitleId = "0100ABCD00000000".parse().unwrap();
        let update: TitleId = "0100ABCD00000800".parse().unwrap();
        let dlc: TitleId = "0100ABCD00001001".parse().unwrap();

        assert_eq!(
            canonical_archive_name(TitleType::Game, "Some: Game", game, 0, "nsp"),
            "Some Game [0100ABCD00000000][v0].nsp"
        );
        assert_eq!(
            canonical_archive_name(TitleType::Update, "Some Game", update, 65536, ".nsp"),
            "Some Game [UPD][0100ABCD00000800][v65536].nsp"
        );
        assert_eq!(
            canonical_archive_name(TitleType::Dlc, "Pack", dlc, 0, "nsp"),
            "[DLC] Pack [0100ABCD00001001][v0].nsp"
        );
        assert_eq!(
            canonical_archive_name(TitleType::Dlc, "[DLC] Pack", dlc, 0, "nsp"),
            "[DLC] Pack [0100ABCD00001001][v0].nsp"
        );
    }

    #[test]
    fn test_canonical_names_parse_back() {
        let update: TitleId = "0100ABCD00000800".parse().unwrap();
        let file = canonical_archive_name(TitleType::Update, "Some Game", update, 131072, "nsp");
        let parsed = parse_archive_name(&file).unwrap();
        assert_eq!(parsed.kind, ArchiveKind::Update);
        assert_eq!(parsed.id, update);
        assert_eq!(parsed.version, 131072);
    }
}
