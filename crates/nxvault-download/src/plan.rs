//! Scope expansion
//!
//! A scope is a combination of base, update and DLC. Expansion is a pure
//! function from a scope and a target to the ordered downloads it implies:
//!
//! | Scope               | Steps                                   |
//! |---------------------|-----------------------------------------|
//! | BaseOnly            | base                                    |
//! | UpdateOnly          | update v, v - stride, ... (excluding 0) |
//! | AllDlc              | the DLC itself, or every DLC of a game  |
//! | BaseAndUpdate       | base, updates                           |
//! | BaseAndDlc          | base, DLC                               |
//! | UpdateAndDlc        | updates, DLC                            |
//! | BaseAndUpdateAndDlc | base, updates, DLC                      |

use crate::DownloadError;
use nxvault_library::{GameInfo, Title, TitleId, TitleKind, VERSION_STRIDE};
use std::fmt;
use std::str::FromStr;

/// Requested combination of base, update and DLC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeOption {
    BaseOnly,
    UpdateOnly,
    AllDlc,
    BaseAndUpdate,
    BaseAndDlc,
    UpdateAndDlc,
    BaseAndUpdateAndDlc,
}

impl ScopeOption {
    pub const ALL: [ScopeOption; 7] = [
        ScopeOption::BaseOnly,
        ScopeOption::UpdateOnly,
        ScopeOption::AllDlc,
        ScopeOption::BaseAndUpdate,
        ScopeOption::BaseAndDlc,
        ScopeOption::UpdateAndDlc,
        ScopeOption::BaseAndUpdateAndDlc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeOption::BaseOnly => "base",
            ScopeOption::UpdateOnly => "update",
            ScopeOption::AllDlc => "dlc",
            ScopeOption::BaseAndUpdate => "base+update",
            ScopeOption::BaseAndDlc => "base+dlc",
            ScopeOption::UpdateAndDlc => "update+dlc",
            ScopeOption::BaseAndUpdateAndDlc => "all",
        }
    }

    pub fn includes_base(&self) -> bool {
        matches!(
            self,
            ScopeOption::BaseOnly
                | ScopeOption::BaseAndUpdate
                | ScopeOption::BaseAndDlc
                | ScopeOption::BaseAndUpdateAndDlc
        )
    }

    pub fn includes_update(&self) -> bool {
        matches!(
            self,
            ScopeOption::UpdateOnly
                | ScopeOption::BaseAndUpdate
                | ScopeOption::UpdateAndDlc
                | ScopeOption::BaseAndUpdateAndDlc
        )
    }

    pub fn includes_dlc(&self) -> bool {
        matches!(
            self,
            ScopeOption::AllDlc
                | ScopeOption::BaseAndDlc
                | ScopeOption::UpdateAndDlc
                | ScopeOption::BaseAndUpdateAndDlc
        )
    }
}

impl fmt::Display for ScopeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "+");
        match normalized.as_str() {
            "base" | "base+only" => Ok(ScopeOption::BaseOnly),
            "update" | "update+only" => Ok(ScopeOption::UpdateOnly),
            "dlc" | "all+dlc" => Ok(ScopeOption::AllDlc),
            "base+update" => Ok(ScopeOption::BaseAndUpdate),
            "base+dlc" => Ok(ScopeOption::BaseAndDlc),
            "update+dlc" => Ok(ScopeOption::UpdateAndDlc),
            "all" | "base+update+dlc" => Ok(ScopeOption::BaseAndUpdateAndDlc),
            _ => Err(format!("unknown scope '{}'", s)),
        }
    }
}

/// One single-artifact download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStep {
    Base(TitleId),
    Update {
        id: TitleId,
        game_id: TitleId,
        version: u32,
    },
    Dlc(TitleId),
}

impl DownloadStep {
    pub fn id(&self) -> TitleId {
        match *self {
            DownloadStep::Base(id) | DownloadStep::Dlc(id) => id,
            DownloadStep::Update { id, .. } => id,
        }
    }

    /// Base games and DLC are always fetched at version 0
    pub fn version(&self) -> u32 {
        match *self {
            DownloadStep::Base(_) | DownloadStep::Dlc(_) => 0,
            DownloadStep::Update { version, .. } => version,
        }
    }
}

impl fmt::Display for DownloadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadStep::Base(id) => write!(f, "base {}", id),
            DownloadStep::Update { id, version, .. } => write!(f, "update {} v{}", id, version),
            DownloadStep::Dlc(id) => write!(f, "DLC {}", id),
        }
    }
}

/// Expand a scope into ordered download steps
///
/// `owner` is the game info of the target's base game. It is read from the
/// target itself when the target is a game, so callers only need it for DLC
/// and update targets.
pub fn expand_scope(
    scope: ScopeOption,
    target: &Title,
    owner: Option<&GameInfo>,
    version: u32,
) -> Result<Vec<DownloadStep>, DownloadError> {
    let game_id = target.base_id();
    let game = target.game_info().or(owner);
    let mut steps = Vec::new();

    if scope.includes_base() {
        steps.push(DownloadStep::Base(game_id));
    }

    if scope.includes_update() && version > 0 {
        let update_id = game_id.update_from_base_game()?;
        let mut current = version;
        while current > 0 {
            steps.push(DownloadStep::Update {
                id: update_id,
                game_id,
                version: current,
            });
            current = current.saturating_sub(VERSION_STRIDE);
        }
    }

    if scope.includes_dlc() {
        match target.kind {
            TitleKind::Dlc { .. } => steps.push(DownloadStep::Dlc(target.id)),
            _ => {
                let dlc = game.map(|info| info.dlc.as_slice()).unwrap_or_default();
                steps.extend(dlc.iter().copied().map(DownloadStep::Dlc));
            }
        }
    }

    Ok(steps)
}
