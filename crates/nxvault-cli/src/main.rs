//! nxvault command line
//!
//! Every command starts from the same state: the key list, then the
//! metadata overlay on top of it. Commands that change the collection save
//! the overlay before exiting.

mod commands;

use anyhow::{Context, Result, bail};
use clap::Parser;
use commands::{Cli, Commands};
use nxvault_config::VaultConfig;
use nxvault_download::{
    DownloadOptions, DownloadOrchestrator, Downloader, ExternalDownloader, IconSource,
    RepackCoordinator, ScopeOption, prefetch_icons,
};
use nxvault_library::{CollectionIndex, CollectionItem, LibraryLoader, ScanConfig, TitleId};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => VaultConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => VaultConfig::load_layered().context("Failed to load configuration")?,
    };

    let mut session = Session::open(config)?;

    match cli.command {
        Commands::Load { offline } => {
            if session.config.library.roms_dir.is_dir() {
                let roms_dir = session.config.library.roms_dir.clone();
                session.scan(&roms_dir)?;
            } else {
                info!(
                    "ROM directory {} not found, skipping scan",
                    session.config.library.roms_dir.display()
                );
            }
            if !offline {
                let orchestrator = session.orchestrator()?;
                match orchestrator
                    .refresh_latest_versions(&mut session.index)
                    .await
                {
                    Ok(count) => info!("Latest versions known for {} games", count),
                    Err(e) => warn!("Could not fetch latest versions: {}", e),
                }
            }
            print_summary(&session.index);
            session.save()?;
        }

        Commands::Diff { key_file } => {
            let added = session
                .loader
                .diff_key_file(&mut session.index, &key_file)
                .with_context(|| format!("Failed to read {}", key_file.display()))?;
            for item in &added {
                println!("{}", format_item(item));
            }
            println!("{} new titles", added.len());
            session.save()?;
        }

        Commands::Scan { dir } => {
            let dir = dir.unwrap_or_else(|| session.config.library.roms_dir.clone());
            session.scan(&dir)?;
            session.save()?;
        }

        Commands::List {
            owned,
            favorites,
            json,
        } => {
            let items: Vec<&CollectionItem> = if owned {
                session.index.owned().collect()
            } else if favorites {
                session.index.favorites().collect()
            } else {
                session.index.iter().collect()
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for item in &items {
                    println!("{}", format_item(item));
                }
            }
        }

        Commands::Download {
            id,
            version,
            scope,
            no_repack,
            no_verify,
        } => {
            let mut options = DownloadOptions::from(&session.config.download);
            options.repack &= !no_repack;
            options.verify &= !no_verify;
            let orchestrator = session.orchestrator()?;

            let result = download(
                &orchestrator,
                &mut session.index,
                id,
                version,
                scope,
                options,
            )
            .await;
            // Completed steps are recorded even when a later one failed
            session.save()?;
            result?;
        }

        Commands::Favorite { id, off } => {
            if !session.index.set_favorite(id, !off) {
                bail!("Title {} is not in the collection", id);
            }
            session.save()?;
        }

        Commands::Icons => {
            let downloader = ExternalDownloader::new(&session.config.remote)?;
            let ids: Vec<TitleId> = session.index.games().map(CollectionItem::id).collect();
            let icons = prefetch_icons(&downloader, ids).await;
            let placeholders = icons
                .iter()
                .filter(|(_, source)| *source == IconSource::Placeholder)
                .count();
            println!(
                "{} icons cached, {} placeholders",
                icons.len() - placeholders,
                placeholders
            );
        }
    }

    Ok(())
}

/// Setup logging to the console
fn setup_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

/// Collection state shared by every command
struct Session {
    config: VaultConfig,
    loader: LibraryLoader,
    index: CollectionIndex,
}

impl Session {
    fn open(config: VaultConfig) -> Result<Self> {
        let loader = LibraryLoader::with_scan_config(ScanConfig::from_extensions(
            &config.library.extensions,
            config.library.recursive,
        ));
        let mut index = CollectionIndex::new();

        let key_file = &config.library.key_file;
        if key_file.exists() {
            loader
                .load_key_file(&mut index, key_file)
                .with_context(|| format!("Failed to load key list {}", key_file.display()))?;
        } else {
            warn!("Key list {} not found", key_file.display());
        }

        loader
            .load_overlay(&mut index, &config.library.overlay_db)
            .context("Failed to load metadata overlay")?;

        Ok(Self {
            config,
            loader,
            index,
        })
    }

    fn scan(&mut self, dir: &Path) -> Result<()> {
        let result = self
            .loader
            .scan_roms(&mut self.index, dir)
            .with_context(|| format!("Failed to scan {}", dir.display()))?;
        println!(
            "Scanned {} files: {} titles matched, {} updates attached, {} unmatched, {} errors",
            result.files_found,
            result.titles_matched,
            result.updates_attached,
            result.unmatched,
            result.errors.len()
        );
        Ok(())
    }

    fn orchestrator(&self) -> Result<DownloadOrchestrator> {
        let downloader: Arc<dyn Downloader> =
            Arc::new(ExternalDownloader::new(&self.config.remote)?);
        Ok(DownloadOrchestrator::new(
            downloader,
            RepackCoordinator::from_config(&self.config.download),
            &self.config.download.download_dir,
        ))
    }

    fn save(&self) -> Result<()> {
        let path = &self.config.library.overlay_db;
        self.loader
            .save_overlay(&self.index, path)
            .with_context(|| format!("Failed to save metadata overlay {}", path.display()))?;
        Ok(())
    }
}

async fn download(
    orchestrator: &DownloadOrchestrator,
    index: &mut CollectionIndex,
    id: TitleId,
    version: Option<u32>,
    scope: Option<ScopeOption>,
    options: DownloadOptions,
) -> Result<()> {
    let Some(scope) = scope else {
        let path = orchestrator
            .download_title(index, id, version.unwrap_or(0), options)
            .await?;
        println!("{} -> {}", id, path.display());
        return Ok(());
    };

    let report = match version {
        Some(version) => {
            orchestrator
                .download_game(index, id, version, scope, options)
                .await?
        }
        None => {
            orchestrator
                .download_latest(index, id, scope, options)
                .await?
        }
    };

    for completed in &report.completed {
        println!("{} -> {}", completed.step, completed.path.display());
    }
    for failed in &report.failed {
        println!("{} failed: {}", failed.step, failed.error);
    }
    if !report.is_success() {
        bail!(
            "{} of {} downloads failed",
            report.failed.len(),
            report.total()
        );
    }
    Ok(())
}

fn format_item(item: &CollectionItem) -> String {
    format!(
        "{}  {:<9} {}{}",
        item.id(),
        item.state.as_str(),
        if item.favorite { "* " } else { "" },
        item.title.display_name()
    )
}

fn print_summary(index: &CollectionIndex) {
    println!(
        "{} titles, {} games, {} owned, {} favorites",
        index.len(),
        index.games().count(),
        index.owned().count(),
        index.favorites().count()
    );
}
