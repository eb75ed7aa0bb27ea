//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global configuration for finsync
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub tdx: TdxConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
    pub workers: WorkersConfig,
    pub http: HttpConfig,
    pub corporate_actions: CorporateActionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TdxConfig {
    /// TDX installation root (`vipdoc/cw`, `T0002/hq_cache` live under it)
    pub root: PathBuf,
}

impl Default for TdxConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("C:/tdx"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub snapshot_dir: PathBuf,
    pub corporate_action_dir: PathBuf,
    pub compression_level: i32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("./output/cw"),
            corporate_action_dir: PathBuf::from("./output"),
            compression_level: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub manifest_url: String,
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            manifest_url: "http://down.tdx.com.cn:8001/tdxfin/gpcw.txt".to_string(),
            base_url: "http://down.tdx.com.cn:8001/tdxfin/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub default: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self { default: 4 }
    }
}

/// HTTP settings; durations in seconds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub read_timeout: u64,
    pub manifest_timeout: u64,
    pub item_deadline: u64,
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout: 30,
            manifest_timeout: 10,
            item_deadline: 600,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorporateActionsConfig {
    pub enabled: bool,
    /// Defaults to `<tdx.root>/T0002/hq_cache/gbbq`
    pub input: Option<PathBuf>,
    /// Cipher key table for the gbbq file
    pub key_file: Option<PathBuf>,
}

impl Default for CorporateActionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            input: None,
            key_file: None,
        }
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub workers: Option<usize>,
    pub max_retries: Option<u32>,
    pub read_timeout: Option<u64>,
    pub no_corporate_actions: bool,
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./finsync.toml (current directory)
    /// 2. ~/.config/finsync/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("finsync.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "finsync") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Build the pipeline configuration, applying command-line overrides
    pub fn pipeline(&self, overrides: Overrides) -> finsync_tdx::Config {
        let mut cfg = finsync_tdx::Config::for_tdx_root(&self.tdx.root, Path::new("."));
        cfg.snapshot_dir = self.output.snapshot_dir.clone();
        cfg.corporate_action_dir = self.output.corporate_action_dir.clone();
        if let Some(input) = &self.corporate_actions.input {
            cfg.corporate_action_input = input.clone();
        }
        cfg.corporate_action_key = self.corporate_actions.key_file.clone();
        cfg.corporate_actions_enabled =
            self.corporate_actions.enabled && !overrides.no_corporate_actions;
        cfg.manifest_url = self.server.manifest_url.clone();
        cfg.base_url = self.server.base_url.clone();
        cfg.workers = overrides.workers.unwrap_or(self.workers.default).max(1);
        cfg.max_retries = overrides.max_retries.unwrap_or(self.http.max_retries);
        cfg.read_timeout =
            Duration::from_secs(overrides.read_timeout.unwrap_or(self.http.read_timeout));
        cfg.manifest_timeout = Duration::from_secs(self.http.manifest_timeout);
        cfg.item_deadline = Duration::from_secs(self.http.item_deadline);
        cfg.zstd_level = self.output.compression_level;
        cfg
    }
}
