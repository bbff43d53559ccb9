//! Configuration sections

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the collection comes from on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Title key list (`TITLEID|TITLEKEY|NAME` per line)
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,

    /// SQLite file holding the persisted metadata overlay
    #[serde(default = "default_overlay_db")]
    pub overlay_db: PathBuf,

    /// Directory scanned for local archives
    #[serde(default = "default_roms_dir")]
    pub roms_dir: PathBuf,

    /// Archive extensions picked up by the scan
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Descend into subdirectories while scanning
    #[serde(default)]
    pub recursive: bool,
}

fn default_key_file() -> PathBuf {
    PathBuf::from("titlekeys.txt")
}

fn default_overlay_db() -> PathBuf {
    PathBuf::from("nxvault.db")
}

fn default_roms_dir() -> PathBuf {
    PathBuf::from("roms")
}

fn default_extensions() -> Vec<String> {
    ["nsp", "nsz", "xci", "xcz"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            key_file: default_key_file(),
            overlay_db: default_overlay_db(),
            roms_dir: default_roms_dir(),
            extensions: default_extensions(),
            recursive: false,
        }
    }
}

/// Download and repack defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root for raw downloads and repacked archives
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Repack raw downloads into a single archive
    #[serde(default = "default_true")]
    pub repack: bool,

    /// Ask the downloader to verify content hashes
    #[serde(default = "default_true")]
    pub verify: bool,

    /// Remove the raw download directory once a repack succeeded
    #[serde(default = "default_true")]
    pub delete_raw_after_repack: bool,

    /// Extension given to repacked archives
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_archive_extension() -> String {
    "nsp".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            repack: true,
            verify: true,
            delete_raw_after_repack: true,
            archive_extension: default_archive_extension(),
        }
    }
}

/// Remote endpoints and the external download tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// JSON document mapping title IDs to their latest version
    #[serde(default)]
    pub versions_url: Option<String>,

    /// Icon URL template, `{id}` is replaced by the title ID
    #[serde(default)]
    pub icon_url: Option<String>,

    /// Local icon cache
    #[serde(default = "default_icon_cache_dir")]
    pub icon_cache_dir: PathBuf,

    /// External tool that fetches, decrypts and repacks content
    #[serde(default = "default_tool_path")]
    pub tool_path: PathBuf,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_icon_cache_dir() -> PathBuf {
    PathBuf::from("cache/icons")
}

fn default_tool_path() -> PathBuf {
    PathBuf::from("nxdl")
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            versions_url: None,
            icon_url: None,
            icon_cache_dir: default_icon_cache_dir(),
            tool_path: default_tool_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
