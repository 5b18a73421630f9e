//! Application configuration loaded from `vidthumbzip.json`.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::generator::Generator;

pub const CONFIG_FILE_NAME: &str = "vidthumbzip.json";

/// What happens to scratch frames while they are written into the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchivePolicy {
    /// Delete each frame right after it has been added to the archive
    #[default]
    Consume,
    /// Keep all frames until the archive is closed, then remove the scratch
    /// directory in one step
    Finalize,
}

/// How a batch reacts to a failing input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchPolicy {
    /// Stop at the first failing input
    #[default]
    Abort,
    /// Log the failure and continue with the next input
    KeepGoing,
}

/// Program overrides for the external tools. Unset entries are looked up
/// on `PATH` by their usual name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub mpv: Option<PathBuf>,
    pub mplayer: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

impl ToolPaths {
    pub fn generator(&self, generator: Generator) -> PathBuf {
        let configured = match generator {
            Generator::Mpv => &self.mpv,
            Generator::Mplayer => &self.mplayer,
            Generator::Ffmpeg => &self.ffmpeg,
        };
        configured
            .clone()
            .unwrap_or_else(|| PathBuf::from(generator.name()))
    }

    pub fn ffmpeg(&self) -> PathBuf {
        self.generator(Generator::Ffmpeg)
    }

    pub fn ffprobe(&self) -> PathBuf {
        self.ffprobe
            .clone()
            .unwrap_or_else(|| PathBuf::from("ffprobe"))
    }
}

fn default_interval_secs() -> u32 {
    60
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generator used when none is selected on the command line
    #[serde(default)]
    pub generator: Generator,
    /// Seconds of video between two thumbnails
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u32,
    #[serde(default)]
    pub archive_policy: ArchivePolicy,
    #[serde(default)]
    pub batch_policy: BatchPolicy,
    /// Keep the scratch directory when the generator fails, for post-mortem
    #[serde(default)]
    pub keep_scratch_on_failure: bool,
    /// Parent directory for scratch workspaces; the system temp dir if unset
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,
    #[serde(default)]
    pub tools: ToolPaths,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            generator: Generator::default(),
            interval_secs: default_interval_secs(),
            archive_policy: ArchivePolicy::default(),
            batch_policy: BatchPolicy::default(),
            keep_scratch_on_failure: false,
            scratch_root: None,
            tools: ToolPaths::default(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(anyhow!("interval_secs must be greater than zero"));
        }
        if let Some(root) = &self.scratch_root {
            if !root.is_dir() {
                return Err(anyhow!("scratch_root {} is not a directory", root.display()));
            }
        }
        Ok(())
    }

    /// Read and validate a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config json {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }
}

/// Candidate config locations, most specific first
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut tried: Vec<PathBuf> = Vec::new();
    if let Some(mut d) = dirs::config_dir() {
        d.push("vidthumbzip");
        d.push(CONFIG_FILE_NAME);
        tried.push(d);
    }
    tried.push(PathBuf::from(CONFIG_FILE_NAME));
    tried
}

/// Load the configuration: an explicit path must exist, otherwise the first
/// existing search path wins, falling back to built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return AppConfig::from_file(path);
    }

    for p in config_search_paths() {
        if p.exists() {
            debug!(path = %p.display(), "loading config");
            return AppConfig::from_file(&p);
        }
    }

    debug!("no config file found, using defaults");
    Ok(AppConfig::default())
}
