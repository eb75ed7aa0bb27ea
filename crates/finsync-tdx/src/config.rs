//! TDX sync pipeline configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use finsync_core::HttpTransport;

/// Runtime configuration for the TDX pipeline.
///
/// Passed by value into the coordinator; nothing in the pipeline reads
/// process-wide settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where packages (`gpcw*.zip`) and their unpacked `.dat` files live
    pub package_dir: PathBuf,
    /// One parquet file per snapshot
    pub snapshot_dir: PathBuf,
    /// Directory holding the consolidated `gbbq.csv`
    pub corporate_action_dir: PathBuf,
    /// Raw corporate-action input file
    pub corporate_action_input: PathBuf,
    /// Key table for the corporate-action cipher
    pub corporate_action_key: Option<PathBuf>,
    /// Run the corporate-action branch at all
    pub corporate_actions_enabled: bool,
    /// Manifest listing `name,md5,size`
    pub manifest_url: String,
    /// Packages are fetched from `base_url + name`
    pub base_url: String,
    /// Worker pool width
    pub workers: usize,
    /// Retries for manifest fetch and per-item transfers
    pub max_retries: u32,
    /// No data for this long aborts a transfer
    pub read_timeout: Duration,
    /// Whole-request timeout for the manifest
    pub manifest_timeout: Duration,
    /// Upper bound for one item's full pipeline
    pub item_deadline: Duration,
    /// Zstd compression level for parquet output
    pub zstd_level: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_tdx_root(Path::new("C:/tdx"), Path::new("output"))
    }
}

impl Config {
    /// Default layout for a TDX installation at `tdx_root`, writing outputs under `output_root`
    pub fn for_tdx_root(tdx_root: &Path, output_root: &Path) -> Self {
        Self {
            package_dir: tdx_root.join("vipdoc").join("cw"),
            snapshot_dir: output_root.join("cw"),
            corporate_action_dir: output_root.to_path_buf(),
            corporate_action_input: tdx_root.join("T0002").join("hq_cache").join("gbbq"),
            corporate_action_key: None,
            corporate_actions_enabled: true,
            manifest_url: "http://down.tdx.com.cn:8001/tdxfin/gpcw.txt".to_string(),
            base_url: "http://down.tdx.com.cn:8001/tdxfin/".to_string(),
            workers: 4,
            max_retries: 3,
            read_timeout: Duration::from_secs(30),
            manifest_timeout: Duration::from_secs(10),
            item_deadline: Duration::from_secs(600),
            zstd_level: 3,
        }
    }

    /// Download URL for a package name
    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }

    /// Consolidated corporate-action export path
    pub fn corporate_action_output(&self) -> PathBuf {
        self.corporate_action_dir.join("gbbq.csv")
    }

    /// HTTP transport configured with this config's timeouts
    pub fn http_transport(&self) -> HttpTransport {
        HttpTransport {
            read_timeout: self.read_timeout,
            request_timeout: self.manifest_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.workers, 4);
        assert_eq!(config.zstd_level, 3);
        assert!(config.manifest_url.ends_with("gpcw.txt"));
        assert!(config.package_dir.ends_with("vipdoc/cw"));
        assert!(config.corporate_action_input.ends_with("T0002/hq_cache/gbbq"));
    }

    #[test]
    fn package_url_handles_trailing_slash() {
        let mut config = Config::default();
        config.base_url = "http://host/tdxfin/".into();
        assert_eq!(
            config.package_url("gpcw20240101.zip"),
            "http://host/tdxfin/gpcw20240101.zip"
        );
        config.base_url = "http://host/tdxfin".into();
        assert_eq!(
            config.package_url("gpcw20240101.zip"),
            "http://host/tdxfin/gpcw20240101.zip"
        );
    }

    #[test]
    fn corporate_action_output_name() {
        let config = Config::for_tdx_root(Path::new("/tdx"), Path::new("/data"));
        assert_eq!(config.corporate_action_output(), PathBuf::from("/data/gbbq.csv"));
        assert_eq!(config.snapshot_dir, PathBuf::from("/data/cw"));
    }
}
