//! Download orchestration for nxvault
//!
//! Turns a requested scope (base, update, DLC) into an ordered list of
//! single-artifact downloads, runs them through a [`Downloader`], repacks the
//! results and records them in the collection.
//!
//! # Features
//!
//! - Pure scope expansion, testable without a network
//! - Continue-and-collect execution of batch scopes
//! - Partial archive cleanup when a repack fails
//! - Concurrent icon prefetch with placeholder fallback

mod downloader;
mod icons;
mod orchestrator;
mod plan;
mod remote;
mod repack;

pub use downloader::{Artifact, DownloadOptions, Downloader};
pub use icons::{IconSource, prefetch_icons};
pub use orchestrator::{CompletedStep, DownloadOrchestrator, FailedStep, ScopeReport};
pub use plan::{DownloadStep, ScopeOption, expand_scope};
pub use remote::ExternalDownloader;
pub use repack::RepackCoordinator;

use nxvault_library::{IdentityError, LibraryError, TitleId};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Title not found: {0}")]
    TitleNotFound(TitleId),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Repack to {} failed: {reason}", path.display())]
    RepackFailed { path: PathBuf, reason: String },

    #[error("External tool failed: {0}")]
    Tool(String),

    #[error("Not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
