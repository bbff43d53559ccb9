//! Title key list parsing
//!
//! Each line is `TITLEID|TITLEKEY|NAME`. The ID is cut to its first 16
//! characters and the key to its first 32; fields after the name are ignored.

use crate::LibraryError;
use crate::identity::{TITLE_ID_LEN, TITLE_KEY_LEN, TitleId, TitleKey};

const FIELD_SEPARATOR: char = '|';

/// One parsed key list line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub id: TitleId,
    pub title_key: Option<TitleKey>,
    pub name: String,
}

/// Parse one line
///
/// Blank lines and `#` comments yield `Ok(None)`. A key that is missing or
/// not hex is treated as absent rather than rejecting the line.
pub fn parse_key_line(line: &str) -> Result<Option<KeyEntry>, LibraryError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split(FIELD_SEPARATOR);
    let (Some(raw_id), Some(raw_key), Some(raw_name)) =
        (fields.next(), fields.next(), fields.next())
    else {
        return Err(LibraryError::InvalidKeyLine(line.to_string()));
    };

    let id = truncate(raw_id.trim(), TITLE_ID_LEN)
        .and_then(TitleId::parse)
        .ok_or_else(|| LibraryError::InvalidKeyLine(line.to_string()))?;

    let title_key = truncate(raw_key.trim(), TITLE_KEY_LEN).and_then(TitleKey::parse);

    Ok(Some(KeyEntry {
        id,
        title_key,
        name: raw_name.trim().to_string(),
    }))
}

/// First `len` characters, or `None` if the field is shorter
fn truncate(field: &str, len: usize) -> Option<&str> {
    field.get(..len)
}
