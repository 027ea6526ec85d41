use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, ensure};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};

/// Zero-width space put in front of the managed group's title.
pub const WATERMARK_PREFIX: char = '\u{200B}';

pub fn config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("nulltab")
}

pub fn config_file() -> PathBuf { config_dir().join("config.toml") }

fn data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("nulltab")
}

pub fn storage_file() -> PathBuf { data_dir().join("storage.json") }

/// Browser state used by the command line when no browser is attached.
pub fn snapshot_file() -> PathBuf { data_dir().join("browser.ron") }

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub settings: Settings,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// How many tabs stay outside the managed group after a switch,
    /// counting the tab being switched to.
    pub max_ungrouped_tabs: usize,
    /// Label shown on the managed group. The stored title carries
    /// [`WATERMARK_PREFIX`] in front of it.
    pub group_label: String,
    /// Grouped tabs idle for longer than this are suspended by
    /// `suspend_stale_tabs`.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub stale_after: Duration,
    /// Upper bound for a single browser or storage call.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub host_call_timeout: Duration,
    pub dashboard_url: String,
    /// Drop commands the browser refuses while the user is dragging tabs
    /// instead of reporting them as failures.
    pub swallow_host_busy: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_ungrouped_tabs: 5,
            group_label: "NullTab".to_string(),
            stale_after: Duration::from_secs(60 * 60 * 24),
            host_call_timeout: Duration::from_millis(5000),
            dashboard_url: "chrome-extension://nulltab/dashboard.html".to_string(),
            swallow_host_busy: true,
        }
    }
}

impl Settings {
    /// Title carried by the managed group: the watermark followed by the label.
    pub fn group_title(&self) -> String { format!("{WATERMARK_PREFIX}{}", self.group_label) }
}

impl Config {
    /// Loads the config from the default location, falling back to defaults
    /// when no file exists yet.
    pub fn load_default() -> anyhow::Result<Config> {
        let path = config_file();
        if !path.exists() {
            return Ok(Config::default());
        }
        Config::read(&path)
    }

    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Config::parse(&buf).with_context(|| format!("loading config file {}", path.display()))
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        let config: Config = toml::from_str(buf)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let settings = &self.settings;
        ensure!(settings.max_ungrouped_tabs >= 1, "max_ungrouped_tabs must be at least 1");
        ensure!(!settings.group_label.trim().is_empty(), "group_label must not be empty");
        ensure!(
            !settings.host_call_timeout.is_zero(),
            "host_call_timeout must be greater than zero"
        );
        ensure!(!settings.dashboard_url.is_empty(), "dashboard_url must not be empty");
        Ok(())
    }
}
