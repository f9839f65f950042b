pub mod download;
pub mod github;
pub mod installer;
pub mod process;
pub mod version;

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Result, UpdateError};
use crate::models::{ReleaseInfo, UpdateEvent, UpdateOutcome, UpdatePlan, UpdateState};

pub use download::HttpDownloader;
pub use github::{select_asset, FeedReleaseFetcher};
pub use installer::ZipInstaller;
pub use process::SystemProcessReaper;
pub use version::{FileVersionStore, DEFAULT_VERSION};

/// Retrieves the latest release description from the feed
pub trait ReleaseFetcher: Send {
    fn fetch(&self, feed_url: &str) -> Result<ReleaseInfo>;
}

/// Single-attempt HTTP transfer
pub trait Downloader: Send {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Stream `url` into `dest`, calling `progress(downloaded, total)` per chunk
    fn fetch_to_file(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<()>;
}

pub trait Installer: Send {
    fn install(&self, archive_path: &Path, target_dir: &Path) -> Result<()>;
}

/// Best-effort termination. Implementations swallow every failure.
pub trait ProcessReaper: Send {
    fn terminate_all(&self, process_name: &str);
}

pub trait VersionStore: Send {
    /// Stored version, `None` when no marker has been written yet
    fn read_marker(&self) -> Result<Option<String>>;

    fn write(&self, version: &str) -> Result<()>;

    /// Stored version, or [`DEFAULT_VERSION`] when absent
    fn read(&self) -> Result<String> {
        Ok(self
            .read_marker()?
            .unwrap_or_else(|| DEFAULT_VERSION.to_string()))
    }
}

/// Receives status updates from a run
pub trait StatusSink {
    fn emit(&self, event: UpdateEvent);
}

impl StatusSink for Sender<UpdateEvent> {
    fn emit(&self, event: UpdateEvent) {
        // receiver gone means nobody is watching, the run continues
        let _ = self.send(event);
    }
}

/// Where and what to update
#[derive(Debug, Clone)]
pub struct UpdateSettings {
    pub feed_url: String,
    pub install_dir: PathBuf,
    pub process_name: String,
}

impl From<&Config> for UpdateSettings {
    fn from(config: &Config) -> Self {
        Self {
            feed_url: config.feed_url.clone(),
            install_dir: config.install_dir.clone(),
            process_name: config.process_name.clone(),
        }
    }
}

/// Sequences fetch, select, compare, kill, download, install and marker write
pub struct UpdateOrchestrator {
    settings: UpdateSettings,
    fetcher: Box<dyn ReleaseFetcher>,
    downloader: Box<dyn Downloader>,
    installer: Box<dyn Installer>,
    reaper: Box<dyn ProcessReaper>,
    store: Box<dyn VersionStore>,
    state: Cell<UpdateState>,
}

impl UpdateOrchestrator {
    pub fn new(
        settings: UpdateSettings,
        fetcher: Box<dyn ReleaseFetcher>,
        downloader: Box<dyn Downloader>,
        installer: Box<dyn Installer>,
        reaper: Box<dyn ProcessReaper>,
        store: Box<dyn VersionStore>,
    ) -> Self {
        Self {
            settings,
            fetcher,
            downloader,
            installer,
            reaper,
            store,
            state: Cell::new(UpdateState::Idle),
        }
    }

    /// Wire up the real HTTP, zip, process-table and file implementations
    pub fn from_config(config: &Config) -> Result<Self> {
        let downloader = HttpDownloader::new(&config.user_agent, config.http_timeout())?;
        Ok(Self::new(
            UpdateSettings::from(config),
            Box::new(FeedReleaseFetcher::new(downloader.clone())),
            Box::new(downloader),
            Box::new(ZipInstaller),
            Box::new(SystemProcessReaper::new(config.kill_timeout())),
            Box::new(FileVersionStore::new(config.version_file_path())),
        ))
    }

    pub fn state(&self) -> UpdateState {
        self.state.get()
    }

    /// Discover and compare only. Nothing is killed, downloaded or written.
    pub fn check(&self) -> Result<UpdatePlan> {
        let release = self.fetcher.fetch(&self.settings.feed_url)?;
        let installed = self.store.read_marker()?;
        plan(&release, installed.as_deref())
    }

    /// Execute one full update run, reporting every transition to `sink`.
    ///
    /// The version marker is written only after a successful install; any
    /// error leaves it exactly as it was so the next run starts over.
    pub fn run(&self, sink: &dyn StatusSink) -> Result<UpdateOutcome> {
        match self.execute(sink) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(kind = e.kind(), error = ?error_chain(&e), "update failed");
                self.transition(UpdateState::Failed, sink);
                Err(e)
            }
        }
    }

    fn execute(&self, sink: &dyn StatusSink) -> Result<UpdateOutcome> {
        self.transition(UpdateState::CheckingForUpdates, sink);
        let plan = self.check()?;

        let asset = match (plan.needs_update, plan.chosen_asset) {
            (true, Some(asset)) => asset,
            _ => {
                self.transition(UpdateState::UpToDate, sink);
                return Ok(UpdateOutcome::UpToDate {
                    version: plan.installed_version,
                });
            }
        };

        info!(
            from = %plan.installed_version,
            to = %plan.target_version,
            asset = %asset.name,
            "update available"
        );

        self.reaper.terminate_all(&self.settings.process_name);

        self.transition(UpdateState::Downloading, sink);
        let staging = tempfile::Builder::new()
            .prefix("autoupdater-")
            .tempdir()
            .map_err(|e| UpdateError::io(std::env::temp_dir(), e))?;
        let archive_path = staging.path().join(archive_file_name(&asset.name));
        self.downloader.fetch_to_file(
            &asset.download_url,
            &archive_path,
            &mut |downloaded, total| sink.emit(UpdateEvent::DownloadProgress { downloaded, total }),
        )?;

        self.transition(UpdateState::Installing, sink);
        self.installer
            .install(&archive_path, &self.settings.install_dir)?;
        self.store.write(&plan.target_version)?;

        self.transition(UpdateState::Completed, sink);
        Ok(UpdateOutcome::Updated {
            from: plan.installed_version,
            to: plan.target_version,
        })
    }

    fn transition(&self, next: UpdateState, sink: &dyn StatusSink) {
        info!(from = ?self.state.get(), to = ?next, "{}", next.label());
        self.state.set(next);
        sink.emit(UpdateEvent::State(next));
    }
}

/// Decide what a run should do. Selection happens before comparison so a
/// release with no installable asset always fails. A missing marker
/// (`installed == None`) always needs an update.
pub fn plan(release: &ReleaseInfo, installed: Option<&str>) -> Result<UpdatePlan> {
    let asset = select_asset(release)?;
    let target = release.version_tag.trim();
    let installed = installed.map(str::trim);
    let needs_update = installed != Some(target);
    let installed = installed.unwrap_or(DEFAULT_VERSION);

    if needs_update && version::is_downgrade(target, installed) {
        warn!(installed, feed = target, "feed version is older than installed, reinstalling it");
    }

    Ok(UpdatePlan {
        needs_update,
        chosen_asset: needs_update.then(|| asset.clone()),
        installed_version: installed.to_string(),
        target_version: target.to_string(),
    })
}

/// Final path component of the asset name; feed-provided names never pick
/// the download location.
fn archive_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "update.zip".to_string())
}

fn error_chain(e: &UpdateError) -> Vec<String> {
    let mut chain = vec![e.to_string()];
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}
