use serde::Deserialize;

/// One downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetRef {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

/// Latest release as reported by the feed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseInfo {
    #[serde(rename = "tag_name")]
    pub version_tag: String,
    pub assets: Vec<AssetRef>,
}

/// Decision computed once per run from the feed and the version marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub needs_update: bool,
    pub chosen_asset: Option<AssetRef>,
    pub installed_version: String,
    pub target_version: String,
}

/// Orchestrator state machine.
///
/// `UpToDate`, `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    CheckingForUpdates,
    UpToDate,
    Downloading,
    Installing,
    Completed,
    Failed,
}

impl UpdateState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::UpToDate | Self::Completed | Self::Failed)
    }

    /// User-facing status line for this state
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Waiting...",
            Self::CheckingForUpdates => "Checking for updates...",
            Self::UpToDate => "Already up to date!",
            Self::Downloading => "Downloading...",
            Self::Installing => "Installing...",
            Self::Completed => "Update completed!",
            Self::Failed => "Error occurred!",
        }
    }
}

/// Notification pushed to whoever is presenting the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    State(UpdateState),
    DownloadProgress { downloaded: u64, total: Option<u64> },
}

/// Successful end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate { version: String },
    Updated { from: String, to: String },
}
