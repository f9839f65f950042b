use tracing::debug;

use super::{Downloader, ReleaseFetcher};
use crate::error::{Result, UpdateError};
use crate::models::{AssetRef, ReleaseInfo};

const ARCHIVE_EXTENSION: &str = ".zip";
const EXCLUDED_MARKER: &str = "source";

/// Fetches the release document through a [`Downloader`] and decodes it
pub struct FeedReleaseFetcher<D> {
    downloader: D,
}

impl<D: Downloader> FeedReleaseFetcher<D> {
    pub fn new(downloader: D) -> Self {
        Self { downloader }
    }
}

impl<D: Downloader> ReleaseFetcher for FeedReleaseFetcher<D> {
    fn fetch(&self, feed_url: &str) -> Result<ReleaseInfo> {
        let body = self.downloader.fetch_bytes(feed_url)?;
        debug!(bytes = body.len(), "release feed received");
        parse_release(&body)
    }
}

/// Decode a release document (`tag_name` + `assets[].{name,browser_download_url}`)
pub fn parse_release(body: &[u8]) -> Result<ReleaseInfo> {
    let release: ReleaseInfo = serde_json::from_slice(body)
        .map_err(|e| UpdateError::Parse(format!("failed to decode release JSON: {}", e)))?;

    if release.version_tag.trim().is_empty() {
        return Err(UpdateError::Parse("tag_name is empty".to_string()));
    }

    if let Some(asset) = release
        .assets
        .iter()
        .find(|a| a.name.is_empty() || a.download_url.is_empty())
    {
        return Err(UpdateError::Parse(format!(
            "asset {:?} is missing its name or download url",
            asset.name
        )));
    }

    Ok(release)
}

/// Whether an asset name looks like a binary zip distribution
pub fn is_installable(name: &str) -> bool {
    let name = name.to_lowercase();
    name.ends_with(ARCHIVE_EXTENSION) && !name.contains(EXCLUDED_MARKER)
}

/// Pick the first installable asset in feed order
pub fn select_asset(release: &ReleaseInfo) -> Result<&AssetRef> {
    release
        .assets
        .iter()
        .find(|a| is_installable(&a.name))
        .ok_or_else(|| UpdateError::NoSuitableAsset {
            tag: release.version_tag.clone(),
            available: release.assets.iter().map(|a| a.name.clone()).collect(),
        })
}
