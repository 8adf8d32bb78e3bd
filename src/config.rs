//! Configuration for callarchive.
//!
//! Two halves:
//! - [`ResolvedConfig`]: tunables (endpoints, paths, checkpoint backend),
//!   read from an optional YAML file with defaults for everything.
//! - [`Credentials`]: secrets and target IDs, supplied through CLI flags or
//!   environment variables. Only `run` requires them.
//!
//! Config file discovery (first match wins):
//! 1. `--config <path>` / `CALLARCHIVE_CONFIG`
//! 2. `.callarchive/config.yaml` in the current directory or a parent
//! 3. `<user config dir>/callarchive/config.yaml`
//!
//! Relative paths in a project config file are resolved against the
//! project root (the parent of `.callarchive/`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::checkpoint::CheckpointBackend;

pub const DEFAULT_PROVIDER_URL: &str = "https://api.elevenlabs.io/v1/convai";
pub const DEFAULT_DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
pub const DEFAULT_DOCS_URL: &str = "https://docs.googleapis.com/v1";
pub const DEFAULT_CHECKPOINT_FILE: &str = "processed_conversations.txt";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub const LOCK_FILE_NAME: &str = "callarchive.lock";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {name}. Set --{flag} or the {env} environment variable")]
    Missing {
        name: &'static str,
        flag: &'static str,
        env: &'static str,
    },
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub google: GoogleSection,
    #[serde(default)]
    pub checkpoint: CheckpointSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub http: HttpSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSection {
    pub base_url: Option<String>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleSection {
    pub drive_upload_url: Option<String>,
    pub docs_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckpointSection {
    pub backend: Option<CheckpointBackend>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsSection {
    /// Where audio is downloaded before upload
    pub work_dir: Option<String>,
    /// Where the lock file lives
    pub state_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpSection {
    pub timeout_seconds: Option<u64>,
}

/// Resolved tunables with absolute-or-cwd-relative paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub provider_base_url: String,
    pub page_size: u32,
    pub drive_upload_url: String,
    pub docs_url: String,
    pub checkpoint_backend: CheckpointBackend,
    pub checkpoint_path: PathBuf,
    pub work_dir: PathBuf,
    pub state_dir: PathBuf,
    pub http_timeout: Duration,
    /// Config file the values came from, if any
    pub config_file: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_file(ConfigFile::default(), Path::new("."), None)
    }
}

impl ResolvedConfig {
    /// Apply defaults to a parsed file; relative paths resolve against `base`
    pub fn from_file(file: ConfigFile, base: &Path, config_file: Option<PathBuf>) -> Self {
        let resolve = |p: Option<String>, default: &str| -> PathBuf {
            resolve_path(base, p.as_deref().unwrap_or(default))
        };

        Self {
            provider_base_url: file
                .provider
                .base_url
                .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string()),
            page_size: file.provider.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
            drive_upload_url: file
                .google
                .drive_upload_url
                .unwrap_or_else(|| DEFAULT_DRIVE_UPLOAD_URL.to_string()),
            docs_url: file
                .google
                .docs_url
                .unwrap_or_else(|| DEFAULT_DOCS_URL.to_string()),
            checkpoint_backend: file.checkpoint.backend.unwrap_or_default(),
            checkpoint_path: resolve(file.checkpoint.path, DEFAULT_CHECKPOINT_FILE),
            work_dir: resolve(file.paths.work_dir, "."),
            state_dir: resolve(file.paths.state_dir, "."),
            http_timeout: Duration::from_secs(
                file.http.timeout_seconds.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
            config_file,
        }
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join(LOCK_FILE_NAME)
    }

    /// Shared HTTP client honouring the configured timeout
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .user_agent(concat!("callarchive/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")
    }
}

/// Connection details for the conversation provider
#[derive(Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: String,
    pub page_size: u32,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Secrets and target identifiers needed for a pipeline run
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub agent_id: String,
    pub document_id: String,
    pub drive_folder_id: String,
    /// Service-account key, JSON text
    pub google_credentials_json: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("agent_id", &self.agent_id)
            .field("document_id", &self.document_id)
            .field("drive_folder_id", &self.drive_folder_id)
            .field("google_credentials_json", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Validate that every value is present and non-blank
    pub fn from_parts(
        api_key: Option<String>,
        agent_id: Option<String>,
        document_id: Option<String>,
        drive_folder_id: Option<String>,
        google_credentials_json: Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: required(api_key, "provider API key", "api-key", "ELEVENLABS_API_KEY")?,
            agent_id: required(agent_id, "agent ID", "agent-id", "AGENT_ID")?,
            document_id: required(document_id, "document ID", "doc-id", "GOOGLE_DOC_ID")?,
            drive_folder_id: required(
                drive_folder_id,
                "Drive folder ID",
                "drive-folder-id",
                "DRIVE_FOLDER_ID",
            )?,
            google_credentials_json: required(
                google_credentials_json,
                "Google service account credentials",
                "google-credentials",
                "GOOGLE_CREDENTIALS_JSON",
            )?,
        })
    }

    pub fn provider(&self, config: &ResolvedConfig) -> ProviderSettings {
        ProviderSettings {
            base_url: config.provider_base_url.clone(),
            api_key: self.api_key.clone(),
            page_size: config.page_size,
        }
    }
}

fn required(
    value: Option<String>,
    name: &'static str,
    flag: &'static str,
    env: &'static str,
) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing { name, flag, env })
}

/// Find a project config file by searching `start` and its parents
fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".callarchive").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

fn user_config() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("callarchive").join("config.yaml");
    path.exists().then_some(path)
}

/// Load and parse a config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(ConfigFile::default());
    }

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() || base == Path::new(".") {
        path
    } else {
        base.join(path)
    }
}

/// Directory that relative paths in `config_path` are resolved against
fn base_dir_for(config_path: &Path) -> PathBuf {
    let parent = config_path.parent().unwrap_or(Path::new("."));
    if parent.file_name().map(|n| n == ".callarchive").unwrap_or(false) {
        parent.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}

/// Load configuration from an explicit path or by discovery
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let config_path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let cwd = std::env::current_dir().context("Failed to determine current directory")?;
            find_project_config(&cwd).or_else(user_config)
        }
    };

    match config_path {
        Some(path) => {
            let file = load_config_file(&path)?;
            let base = base_dir_for(&path);
            Ok(ResolvedConfig::from_file(file, &base, Some(path)))
        }
        None => Ok(ResolvedConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ResolvedConfig::default();

        assert_eq!(config.provider_base_url, DEFAULT_PROVIDER_URL);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.checkpoint_backend, CheckpointBackend::File);
        assert_eq!(config.checkpoint_path, PathBuf::from(DEFAULT_CHECKPOINT_FILE));
        assert_eq!(config.work_dir, PathBuf::from("."));
        assert_eq!(config.lock_path(), PathBuf::from("./callarchive.lock"));
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing_and_resolution() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".callarchive");
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
provider:
  base_url: http://localhost:9000/convai
  page_size: 25
checkpoint:
  backend: sqlite
  path: state/checkpoint.db
paths:
  work_dir: /var/tmp/calls
http:
  timeout_seconds: 5
"#
        )
        .unwrap();

        let config = load_config(Some(&config_path)).unwrap();

        assert_eq!(config.provider_base_url, "http://localhost:9000/convai");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.checkpoint_backend, CheckpointBackend::Sqlite);
        assert_eq!(config.checkpoint_path, temp.path().join("state/checkpoint.db"));
        assert_eq!(config.work_dir, PathBuf::from("/var/tmp/calls"));
        assert_eq!(config.state_dir, temp.path().to_path_buf());
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.docs_url, DEFAULT_DOCS_URL);
    }

    #[test]
    fn test_find_project_config_walks_up() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".callarchive");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.yaml"), "").unwrap();

        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_config(&nested), Some(dir.join("config.yaml")));
    }

    #[test]
    fn test_empty_config_file_is_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "\n").unwrap();

        let file = load_config_file(&path).unwrap();
        assert!(file.provider.base_url.is_none());
    }

    #[test]
    fn test_page_size_zero_is_clamped() {
        let file: ConfigFile = serde_yaml::from_str("provider:\n  page_size: 0\n").unwrap();
        let config = ResolvedConfig::from_file(file, Path::new("."), None);
        assert_eq!(config.page_size, 1);
    }

    #[test]
    fn test_credentials_require_every_value() {
        let err = Credentials::from_parts(
            Some("key".to_string()),
            Some("agent".to_string()),
            None,
            Some("folder".to_string()),
            Some("{}".to_string()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("GOOGLE_DOC_ID"));

        let blank = Credentials::from_parts(
            Some("  ".to_string()),
            Some("agent".to_string()),
            Some("doc".to_string()),
            Some("folder".to_string()),
            Some("{}".to_string()),
        );
        assert!(blank.is_err());
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::from_parts(
            Some("sk_live_secret".to_string()),
            Some("agent".to_string()),
            Some("doc".to_string()),
            Some("folder".to_string()),
            Some(r#"{"private_key":"pem"}"#.to_string()),
        )
        .unwrap();

        let printed = format!("{:?}", creds);
        assert!(!printed.contains("sk_live_secret"));
        assert!(!printed.contains("pem"));
        assert!(printed.contains("agent"));
    }
}
