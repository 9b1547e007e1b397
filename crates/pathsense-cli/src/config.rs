//! Configuration Vault – reads/writes `~/.pathsense/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pathsense_perception::PipelineConfig;
use pathsense_perception::vision_client::DEFAULT_VISION_ENDPOINT;

/// Persisted user configuration stored in `~/.pathsense/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Full URL of the `images:annotate` endpoint.
    #[serde(default = "default_vision_endpoint")]
    pub vision_endpoint: String,

    /// Vision API key (stored as plain text – users should restrict file
    /// permissions on `~/.pathsense/config.toml`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vision_api_key: String,

    /// Hard limit on one outbound detection call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Minimum spacing between outbound detection calls, in milliseconds.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// Objects and labels requested per frame.
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("vision_endpoint", &self.vision_endpoint)
            .field(
                "vision_api_key",
                if self.vision_api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("min_request_interval_ms", &self.min_request_interval_ms)
            .field("max_results", &self.max_results)
            .finish()
    }
}

fn default_vision_endpoint() -> String {
    DEFAULT_VISION_ENDPOINT.to_string()
}
fn default_request_timeout_secs() -> u64 {
    5
}
fn default_min_request_interval_ms() -> u64 {
    1000
}
fn default_max_results() -> u32 {
    pathsense_perception::DEFAULT_MAX_RESULTS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vision_endpoint: default_vision_endpoint(),
            vision_api_key: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            min_request_interval_ms: default_min_request_interval_ms(),
            max_results: default_max_results(),
        }
    }
}

impl Config {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.vision_endpoint.trim().is_empty() {
            return Err("vision_endpoint must not be empty".into());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be at least 1".into());
        }
        if self.min_request_interval_ms == 0 {
            return Err("min_request_interval_ms must be at least 1".into());
        }
        if self.max_results == 0 {
            return Err("max_results must be at least 1".into());
        }
        Ok(())
    }

    /// Settings handed to the perception pipeline.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            vision_endpoint: self.vision_endpoint.clone(),
            api_key: self.vision_api_key.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            min_request_interval: Duration::from_millis(self.min_request_interval_ms),
        }
    }
}

/// Return the path to `~/.pathsense/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".pathsense").join("config.toml")
}

/// Load the config from `path`, falling back to defaults when the file does
/// not exist.  Environment overrides are applied either way.
pub fn load_or_default(path: &Path) -> Result<Config, String> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `PATHSENSE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `PATHSENSE_VISION_ENDPOINT` | `vision_endpoint` |
/// | `PATHSENSE_VISION_API_KEY` | `vision_api_key` |
/// | `PATHSENSE_REQUEST_TIMEOUT_SECS` | `request_timeout_secs` |
/// | `PATHSENSE_MIN_REQUEST_INTERVAL_MS` | `min_request_interval_ms` |
/// | `PATHSENSE_MAX_RESULTS` | `max_results` |
///
/// Numeric values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("PATHSENSE_VISION_ENDPOINT") {
        cfg.vision_endpoint = v;
    }
    if let Ok(v) = std::env::var("PATHSENSE_VISION_API_KEY") {
        cfg.vision_api_key = v;
    }
    if let Ok(v) = std::env::var("PATHSENSE_REQUEST_TIMEOUT_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.request_timeout_secs = secs;
    }
    if let Ok(v) = std::env::var("PATHSENSE_MIN_REQUEST_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.min_request_interval_ms = ms;
    }
    if let Ok(v) = std::env::var("PATHSENSE_MAX_RESULTS")
        && let Ok(n) = v.parse::<u32>()
    {
        cfg.max_results = n;
    }
}

/// Save the config to a specific path, creating the parent directory if
/// necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Restrict the config directory to the owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    // The file may hold the API key: owner-only read/write (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
