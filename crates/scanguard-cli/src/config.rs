//! Node configuration – reads/writes `~/.scanguard/config.toml`.

use scanguard_middleware::RosTopics;
use scanguard_perception::DetectionThresholds;
use scanguard_types::ScanError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted node configuration.  Every field has a default, so a partial
/// (or absent) file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// rosbridge WebSocket endpoint.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    #[serde(default = "default_scan_topic")]
    pub scan_topic: String,

    #[serde(default = "default_tuning_topic")]
    pub tuning_topic: String,

    #[serde(default = "default_collision_topic")]
    pub collision_topic: String,

    /// Per-sector trigger distances in metres.
    #[serde(default)]
    pub thresholds: DetectionThresholds,
}

fn default_rosbridge_url() -> String {
    "ws://localhost:9090".to_string()
}
fn default_scan_topic() -> String {
    "/scan".to_string()
}
fn default_tuning_topic() -> String {
    "/sliding_window/set".to_string()
}
fn default_collision_topic() -> String {
    "/collision".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rosbridge_url: default_rosbridge_url(),
            scan_topic: default_scan_topic(),
            tuning_topic: default_tuning_topic(),
            collision_topic: default_collision_topic(),
            thresholds: DetectionThresholds::default(),
        }
    }
}

impl Config {
    pub fn topics(&self) -> RosTopics {
        RosTopics {
            scan: self.scan_topic.clone(),
            tuning: self.tuning_topic.clone(),
            collision: self.collision_topic.clone(),
        }
    }
}

/// Return the path to `~/.scanguard/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".scanguard").join("config.toml")
}

/// Load the config from the default location, falling back to defaults when
/// the file is absent.  Environment overrides are applied either way.
pub fn load() -> Result<Config, ScanError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Read and parse a config file.  Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ScanError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| ScanError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg = toml::from_str(&raw).map_err(|e| ScanError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `SCANGUARD_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SCANGUARD_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `SCANGUARD_SCAN_TOPIC` | `scan_topic` |
/// | `SCANGUARD_TUNING_TOPIC` | `tuning_topic` |
/// | `SCANGUARD_COLLISION_TOPIC` | `collision_topic` |
pub fn apply_env_overrides(cfg: &mut Config) {
    let overrides: [(&str, &mut String); 4] = [
        ("SCANGUARD_ROSBRIDGE_URL", &mut cfg.rosbridge_url),
        ("SCANGUARD_SCAN_TOPIC", &mut cfg.scan_topic),
        ("SCANGUARD_TUNING_TOPIC", &mut cfg.tuning_topic),
        ("SCANGUARD_COLLISION_TOPIC", &mut cfg.collision_topic),
    ];
    for (var, field) in overrides {
        if let Ok(v) = std::env::var(var)
            && !v.is_empty()
        {
            *field = v;
        }
    }
}

/// Write `cfg` to the default location.
pub fn save(cfg: &Config) -> Result<PathBuf, ScanError> {
    let path = config_path();
    save_to(cfg, &path)?;
    Ok(path)
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), ScanError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ScanError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| ScanError::Config(format!("failed to set config directory permissions: {e}")))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| ScanError::Serialization(e.to_string()))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| ScanError::Config(format!("failed to write {}: {e}", path.display())))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| ScanError::Config(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}
