//! Icon prefetch

use crate::downloader::Downloader;
use futures_util::future::join_all;
use nxvault_library::TitleId;
use std::path::PathBuf;

/// Where a title's icon is shown from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    Cached(PathBuf),
    Placeholder,
}

/// Fetch every icon at once
///
/// All requests are in flight together and finish in any order. A failed
/// fetch yields [`IconSource::Placeholder`] for that title only.
pub async fn prefetch_icons<I>(downloader: &dyn Downloader, ids: I) -> Vec<(TitleId, IconSource)>
where
    I: IntoIterator<Item = TitleId>,
{
    let fetches = ids.into_iter().map(|id| async move {
        let source = match downloader.download_remote_image(id).await {
            Ok(path) => IconSource::Cached(path),
            Err(e) => {
                tracing::debug!("No icon for {}: {}", id, e);
                IconSource::Placeholder
            }
        };
        (id, source)
    });

    let icons = join_all(fetches).await;
    let cached = icons
        .iter()
        .filter(|(_, source)| matches!(source, IconSource::Cached(_)))
        .count();
    tracing::info!("Prefetched {} of {} icons", cached, icons.len());
    icons
}
