//! Command line definitions

use clap::{Parser, Subcommand};
use nxvault_download::ScopeOption;
use nxvault_library::TitleId;
use std::path::PathBuf;

/// Catalog and download console titles
#[derive(Parser)]
#[command(name = "nxvault", version, about)]
pub struct Cli {
    /// Configuration file (defaults to the layered system and user files)
    #[arg(short, long, env = "NXVAULT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load the key list, overlay and local archives, then print a summary
    Load {
        /// Skip fetching the latest version list
        #[arg(long)]
        offline: bool,
    },

    /// Ingest only titles not yet in the collection and list them
    Diff {
        /// Key list to compare against the collection
        key_file: PathBuf,
    },

    /// Match local archives against the collection
    Scan {
        /// Directory to scan (defaults to the configured ROM directory)
        dir: Option<PathBuf>,
    },

    /// List the collection
    List {
        /// Only titles that are owned or on the console
        #[arg(long, conflicts_with = "favorites")]
        owned: bool,
        /// Only favorites
        #[arg(long)]
        favorites: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Download a title, or a scope of a game
    Download {
        /// Title ID
        id: TitleId,
        /// Version to fetch (defaults to 0, or the latest version with --scope)
        #[arg(long)]
        version: Option<u32>,
        /// base, update, dlc, base+update, base+dlc, update+dlc or all
        #[arg(short, long)]
        scope: Option<ScopeOption>,
        /// Keep the raw download instead of repacking it
        #[arg(long)]
        no_repack: bool,
        /// Skip content verification
        #[arg(long)]
        no_verify: bool,
    },

    /// Mark or unmark a title as favorite
    Favorite {
        /// Title ID
        id: TitleId,
        /// Remove the mark
        #[arg(long)]
        off: bool,
    },

    /// Cache icons for every game in the collection
    Icons,
}
