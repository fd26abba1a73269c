//! Broker configuration: discovery and YAML model
//!
//! Discovery order, first hit wins:
//! 1. `SKYBROKER_CONFIG` environment variable (direct path)
//! 2. current directory: `skybroker.local.yaml`, `.skybroker.local.yaml`,
//!    `skybroker.yaml`, `.skybroker.yaml`
//! 3. `./.skybroker/` directory, same filenames
//! 4. `~/.config/skybroker/skybroker.yaml` (global)

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CANDIDATES: [&str; 4] = [
    "skybroker.local.yaml",
    ".skybroker.local.yaml",
    "skybroker.yaml",
    ".skybroker.yaml",
];

/// Global configuration directory, created on first use.
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("skybroker");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("SKYBROKER_CONFIG") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let broker_dir = current_dir.join(".skybroker");
    if broker_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = broker_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("skybroker").join("skybroker.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::FileNotFound)
}

/// Top-level broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// This broker's identity in the federation. Orders carrying this
    /// id in their `provider` field are fulfilled locally.
    pub provider_id: String,

    /// Directory for the order store. Relative paths resolve against
    /// the working directory of the daemon.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Cloud backends this provider fulfills orders on. At least one.
    pub clouds: Vec<CloudConfig>,

    /// Peer providers this broker federates with.
    #[serde(default)]
    pub peers: Vec<String>,

    #[serde(default)]
    pub intervals: IntervalsConfig,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./skybroker-state")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    pub name: String,
    pub driver: CloudDriver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudDriver {
    Emulated,
}

/// Processor sleep intervals between queue passes, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalsConfig {
    pub dispatch_ms: u64,
    pub pending_ms: u64,
    pub monitor_ms: u64,
    pub status_recheck_ms: u64,
    pub fulfilled_ms: u64,
    pub remote_sync_ms: u64,
    pub closed_ms: u64,
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            dispatch_ms: 1_000,
            pending_ms: 5_000,
            monitor_ms: 2_000,
            status_recheck_ms: 10_000,
            fulfilled_ms: 10_000,
            remote_sync_ms: 5_000,
            closed_ms: 2_000,
        }
    }
}

impl BrokerConfig {
    /// Discover, parse and validate the configuration.
    pub fn load() -> Result<Self> {
        Self::load_from(&find_config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.provider_id.trim().is_empty() {
            return Err(ConfigError::Invalid("provider_id must not be empty".into()));
        }
        if self.clouds.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one cloud must be configured".into(),
            ));
        }
        for (index, cloud) in self.clouds.iter().enumerate() {
            if cloud.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "cloud #{index} has an empty name"
                )));
            }
            if self.clouds[..index].iter().any(|c| c.name == cloud.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate cloud name: {}",
                    cloud.name
                )));
            }
        }
        if self.peers.iter().any(|peer| *peer == self.provider_id) {
            return Err(ConfigError::Invalid(
                "peers must not include this provider itself".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const MINIMAL: &str = "\
provider_id: provider-a
clouds:
  - name: default
    driver: emulated
";

    #[test]
    #[serial]
    fn find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("skybroker.yaml"), MINIMAL).unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let found = find_config_file().unwrap();
        assert!(found.ends_with("skybroker.yaml"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn local_file_takes_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("skybroker.yaml"), MINIMAL).unwrap();
        fs::write(temp_dir.path().join("skybroker.local.yaml"), MINIMAL).unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let found = find_config_file().unwrap();
        assert!(found.ends_with("skybroker.local.yaml"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn env_var_overrides_discovery() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, MINIMAL).unwrap();

        unsafe {
            std::env::set_var("SKYBROKER_CONFIG", config_path.to_str().unwrap());
        }

        let found = find_config_file().unwrap();
        assert_eq!(found, config_path);

        unsafe {
            std::env::remove_var("SKYBROKER_CONFIG");
        }
    }

    #[test]
    #[serial]
    fn missing_config_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        assert!(matches!(find_config_file(), Err(ConfigError::FileNotFound)));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("skybroker.yaml");
        fs::write(&path, MINIMAL).unwrap();

        let config = BrokerConfig::load_from(&path).unwrap();
        assert_eq!(config.provider_id, "provider-a");
        assert_eq!(config.clouds.len(), 1);
        assert_eq!(config.clouds[0].driver, CloudDriver::Emulated);
        assert!(config.peers.is_empty());
        assert_eq!(config.intervals.dispatch_ms, 1_000);
    }

    #[test]
    fn duplicate_cloud_names_are_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("skybroker.yaml");
        fs::write(
            &path,
            "\
provider_id: provider-a
clouds:
  - name: default
    driver: emulated
  - name: default
    driver: emulated
",
        )
        .unwrap();

        assert!(matches!(
            BrokerConfig::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn self_referential_peer_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("skybroker.yaml");
        fs::write(
            &path,
            "\
provider_id: provider-a
clouds:
  - name: default
    driver: emulated
peers:
  - provider-a
",
        )
        .unwrap();

        assert!(matches!(
            BrokerConfig::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
