use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_FEED_URL: &str = "https://api.github.com/repos/NiordFresh/Nocturn/releases/latest";
const DEFAULT_PROCESS_NAME: &str = "nocturn";
const DEFAULT_VERSION_FILE: &str = "ver.ini";
const DEFAULT_USER_AGENT: &str = "Nocturn-AutoUpdater";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Release feed endpoint (GitHub "latest release" API shape)
    pub feed_url: String,

    /// Directory the archive is extracted into
    pub install_dir: PathBuf,

    /// Name of the running application to terminate before installing
    pub process_name: String,

    /// Version marker file name, relative to `install_dir`
    pub version_file: String,

    /// Sent as User-Agent on every request
    pub user_agent: String,

    /// How long to wait for terminated processes to exit
    pub kill_timeout_secs: u64,

    /// Per-request HTTP timeout. Unset means no timeout.
    pub http_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            install_dir: default_install_dir(),
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            version_file: DEFAULT_VERSION_FILE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            kill_timeout_secs: 10,
            http_timeout_secs: None,
        }
    }
}

fn default_install_dir() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\Nocturn")
    } else {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Nocturn")
    }
}

impl Config {
    /// Load from an explicit path, or from the default location if it exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let config_path = Self::config_path();
                if !config_path.exists() {
                    return Ok(Self::default());
                }
                Self::load_from(&config_path)
            }
        }
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("autoupdater")
            .join("config.toml")
    }

    pub fn version_file_path(&self) -> PathBuf {
        self.install_dir.join(&self.version_file)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_secs(self.kill_timeout_secs)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.process_name, "nocturn");
        assert_eq!(config.version_file, "ver.ini");
        assert!(config.http_timeout().is_none());
    }

    #[test]
    fn test_partial_config_overrides() {
        let config = Config::parse(
            r#"
            feed_url = "https://example.com/latest"
            install_dir = "/opt/app"
            http_timeout_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.feed_url, "https://example.com/latest");
        assert_eq!(config.version_file_path(), PathBuf::from("/opt/app").join("ver.ini"));
        assert_eq!(config.http_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.user_agent, "Nocturn-AutoUpdater");
    }

    #[test]
    fn test_unknown_types_rejected() {
        assert!(Config::parse("kill_timeout_secs = \"soon\"").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "process_name = \"myapp\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.process_name, "myapp");
    }
}
