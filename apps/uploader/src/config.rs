//! Uploader configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/oncostage/uploader.toml`
//! - Windows: `%APPDATA%/oncostage/uploader.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use oncostage_protocol::FileCategory;
use oncostage_upload::{RetryPolicy, UploadConfig};
use serde::{Deserialize, Serialize};

/// Uploader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the files API, without the `/files/uploads` suffix.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Bearer token sent with every request. Empty means none.
    #[serde(default)]
    pub api_token: String,

    /// Identity reported to the backend (hostname by default).
    #[serde(default = "default_uploader")]
    pub uploader: String,

    /// Category used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_category: Option<FileCategory>,

    /// Chunk size in MiB.
    #[serde(default = "default_chunk_size_mib")]
    pub chunk_size_mib: usize,

    /// Chunks in flight per file.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts per chunk, including the first.
    #[serde(default = "default_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Attempts for the finalize call.
    #[serde(default = "default_attempts")]
    pub finalize_attempts: u32,

    /// Hash each file before uploading so the backend can deduplicate.
    #[serde(default)]
    pub prehash_digest: bool,

    /// Files uploaded at the same time.
    #[serde(default = "default_parallel_files")]
    pub max_parallel_files: usize,
}

fn default_api_base_url() -> String {
    "http://localhost:8080/api".into()
}

fn default_uploader() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "OncoStage Uploader".into())
}

fn default_chunk_size_mib() -> usize {
    5
}

fn default_concurrency() -> usize {
    3
}

fn default_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    250
}

fn default_parallel_files() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_token: String::new(),
            uploader: default_uploader(),
            default_category: None,
            chunk_size_mib: default_chunk_size_mib(),
            concurrency: default_concurrency(),
            max_attempts: default_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            finalize_attempts: default_attempts(),
            prehash_digest: false,
            max_parallel_files: default_parallel_files(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Writes the configuration to `path`, readable by the owner only.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix; the file may hold an API token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// The bearer token, if one is configured.
    pub fn api_token(&self) -> Option<&str> {
        Some(self.api_token.as_str()).filter(|t| !t.is_empty())
    }

    /// Library settings derived from this file.
    pub fn upload_config(&self) -> UploadConfig {
        UploadConfig {
            chunk_size: self.chunk_size_mib.saturating_mul(1024 * 1024),
            concurrency: self.concurrency,
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                initial_delay: Duration::from_millis(self.retry_delay_ms),
                ..RetryPolicy::default()
            },
            finalize_attempts: self.finalize_attempts,
            prehash_digest: self.prehash_digest,
            uploader: self.uploader.clone(),
            ..UploadConfig::default()
        }
        .normalized()
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("oncostage")
            .join("uploader.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("oncostage").join("uploader.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/oncostage/uploader.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(!config.uploader.is_empty());
        assert_eq!(config.chunk_size_mib, 5);
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.max_parallel_files, 1);
        assert!(config.default_category.is_none());
        assert!(config.api_token().is_none());
    }

    #[test]
    fn config_partial_toml() {
        let toml_str = r#"
api_base_url = "https://files.oncostage.example/api"
default_category = "radiology"
concurrency = 6
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_base_url, "https://files.oncostage.example/api");
        assert_eq!(config.default_category, Some(FileCategory::Radiology));
        assert_eq!(config.concurrency, 6);
        assert_eq!(config.chunk_size_mib, 5);
        assert_eq!(config.finalize_attempts, 3);
    }

    #[test]
    fn unknown_category_rejected() {
        let result = toml::from_str::<Config>(r#"default_category = "dermatology""#);
        assert!(result.is_err());
    }

    #[test]
    fn upload_config_is_normalized() {
        let config = Config {
            chunk_size_mib: 500,
            concurrency: 0,
            max_attempts: 5,
            retry_delay_ms: 100,
            uploader: "ward-3".into(),
            ..Config::default()
        };
        let upload = config.upload_config();
        assert_eq!(upload.chunk_size, 64 * 1024 * 1024);
        assert_eq!(upload.concurrency, 1);
        assert_eq!(upload.retry.max_attempts, 5);
        assert_eq!(upload.retry.initial_delay, Duration::from_millis(100));
        assert_eq!(upload.uploader, "ward-3");
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path().unwrap();
        assert!(path.to_string_lossy().contains("oncostage"));
    }

    #[test]
    fn load_creates_default_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("uploader.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.concurrency, 3);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn config_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("uploader.toml");

        let config = Config {
            api_token: "s3cret".into(),
            default_category: Some(FileCategory::Genomic),
            prehash_digest: true,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_token(), Some("s3cret"));
        assert_eq!(loaded.default_category, Some(FileCategory::Genomic));
        assert!(loaded.prehash_digest);
    }
}
