//! Archive directory scanning

use crate::LibraryError;
use crate::filename::{ArchiveName, parse_archive_name};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of applying a scan to the collection
#[derive(Debug, Default)]
pub struct ScanResult {
    pub files_found: usize,
    pub titles_matched: usize,
    pub updates_attached: usize,
    pub unmatched: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to scan
    pub extensions: HashSet<String>,

    /// Scan subdirectories
    pub recursive: bool,

    /// Skip hidden files/directories
    pub skip_hidden: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let mut extensions = HashSet::new();
        for ext in &["nsp", "nsz", "xci", "xcz"] {
            extensions.insert(ext.to_string());
        }

        Self {
            extensions,
            recursive: false,
            skip_hidden: true,
        }
    }
}

impl ScanConfig {
    /// Build from configured extension names (leading dots allowed)
    pub fn from_extensions<I, S>(extensions: I, recursive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            recursive,
            skip_hidden: true,
        }
    }
}

/// An archive found on disk
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub size: u64,
    /// Parsed name, or the reason it could not be parsed
    pub name: Result<ArchiveName, String>,
}

/// Archive scanner
pub struct ArchiveScanner {
    config: ScanConfig,
}

impl Default for ArchiveScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveScanner {
    /// Create a new scanner with default config
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
        }
    }

    /// Create with custom config
    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Scan a directory for archives
    ///
    /// A missing root is an error; unreadable names are reported per file.
    pub fn scan(&self, root: &Path) -> Result<Vec<ScannedFile>, LibraryError> {
        if !root.is_dir() {
            return Err(LibraryError::PathNotFound(root.to_path_buf()));
        }

        let mut files = Vec::new();
        self.scan_dir(root, &mut files)?;
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    fn scan_dir(&self, path: &Path, files: &mut Vec<ScannedFile>) -> Result<(), LibraryError> {
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let entry_path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            if self.config.skip_hidden && name.starts_with('.') {
                continue;
            }

            if entry_path.is_dir() {
                if self.config.recursive {
                    self.scan_dir(&entry_path, files)?;
                }
            } else if entry_path.is_file()
                && let Some(ext) = entry_path.extension().and_then(|e| e.to_str())
                && self.config.extensions.contains(&ext.to_lowercase())
            {
                let size = Self::file_size(&entry_path).unwrap_or(0);
                files.push(ScannedFile {
                    name: parse_archive_name(&name).map_err(|e| e.to_string()),
                    path: entry_path,
                    size,
                });
            }
        }

        Ok(())
    }

    /// Size of a file in bytes
    pub fn file_size(path: &Path) -> Option<u64> {
        fs::metadata(path).ok().map(|m| m.len())
    }
}
