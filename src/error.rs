use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, UpdateError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can collapse an update run into the failed state.
///
/// Process termination problems are deliberately absent: the reaper swallows
/// them and the install step surfaces any real consequence as [`UpdateError::Io`].
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Feed or asset request failed (connect, timeout, non-2xx, broken body).
    #[error("network request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: BoxError,
    },

    /// Feed body is not the expected release document.
    #[error("malformed release feed: {0}")]
    Parse(String),

    /// No asset in the release passed the selection rule.
    #[error("release {tag} has no installable .zip asset (assets: {})", available.join(", "))]
    NoSuitableAsset { tag: String, available: Vec<String> },

    #[error("I/O error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive could not be opened or decoded.
    #[error("corrupt archive {}", path.display())]
    CorruptArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl UpdateError {
    pub fn network(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Network {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt_archive(path: impl Into<PathBuf>, source: impl Into<zip::result::ZipError>) -> Self {
        Self::CorruptArchive {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Stable short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Parse(_) => "parse",
            Self::NoSuitableAsset { .. } => "no_suitable_asset",
            Self::Io { .. } => "io",
            Self::CorruptArchive { .. } => "corrupt_archive",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(UpdateError::network("http://x", "boom").kind(), "network");
        assert_eq!(UpdateError::Parse("x".into()).kind(), "parse");
        assert_eq!(
            UpdateError::io("/tmp", std::io::Error::other("x")).kind(),
            "io"
        );
        let err = UpdateError::corrupt_archive(
            "/tmp/a.zip",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), "corrupt_archive");
    }

    #[test]
    fn test_no_suitable_asset_lists_names() {
        let err = UpdateError::NoSuitableAsset {
            tag: "v2.0.0".into(),
            available: vec!["app.tar".into(), "notes.txt".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("v2.0.0"));
        assert!(msg.contains("app.tar, notes.txt"));
    }
}
