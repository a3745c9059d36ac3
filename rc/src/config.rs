//! reqcoord configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorConfig;

/// Main reqcoord configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Admission window and timing
    pub coordinator: CoordinatorConfig,

    /// In-process demo settings
    pub demo: DemoConfig,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// An explicit path must load. Otherwise the first readable file of
    /// `./.reqcoord.yml` and `<config_dir>/reqcoord/reqcoord.yml` wins, and
    /// defaults apply when neither exists.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let candidates = std::iter::once(PathBuf::from(".reqcoord.yml"))
            .chain(dirs::config_dir().map(|dir| dir.join("reqcoord").join("reqcoord.yml")));
        if let Some(config) = candidates.filter_map(|path| Self::try_load(&path)).next() {
            return Ok(config);
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load `path` if it exists; a broken file is reported and skipped
    fn try_load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        Self::load_from_file(path)
            .inspect_err(|e| tracing::warn!("Failed to load config from {}: {:#}", path.display(), e))
            .ok()
    }

    /// Read just the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    /// Check the coordinator window before anything is started
    pub fn validate(&self) -> Result<()> {
        self.coordinator.window().context("Invalid coordinator configuration")?;
        Ok(())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// In-process demo configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of requests the client submits
    pub requests: u32,

    /// Topic the demo service answers on
    #[serde(rename = "routing-key")]
    pub routing_key: String,

    /// Mean simulated service time in milliseconds
    #[serde(rename = "service-time-ms")]
    pub service_time_ms: u64,

    /// Simulated service time varies by up to this much either way
    #[serde(rename = "service-jitter-ms")]
    pub service_jitter_ms: u64,

    /// Fail the run if requests are still in flight after this long
    #[serde(rename = "give-up-after-ms", skip_serializing_if = "Option::is_none")]
    pub give_up_after_ms: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            routing_key: "GetPosition".to_string(),
            service_time_ms: 100,
            service_jitter_ms: 20,
            give_up_after_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.log_level.is_none());
        assert_eq!(config.coordinator.max_in_flight, 30);
        assert_eq!(config.demo.requests, 100);
        assert_eq!(config.demo.routing_key, "GetPosition");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "log-level: DEBUG\ncoordinator:\n  max-in-flight: 8\n  min-in-flight: 2\ndemo:\n  requests: 5\n"
        )
        .unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("DEBUG"));
        assert_eq!(config.coordinator.max_in_flight, 8);
        assert_eq!(config.coordinator.min_in_flight, Some(2));
        assert_eq!(config.coordinator.time_budget_ms, 1000);
        assert_eq!(config.demo.requests, 5);
        assert_eq!(config.demo.service_time_ms, 100);
        assert!(config.demo.give_up_after_ms.is_none());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/reqcoord.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_try_load_skips_missing_and_broken_files() {
        assert!(Config::try_load(Path::new("/nonexistent/reqcoord.yml")).is_none());

        let mut broken = NamedTempFile::new().unwrap();
        writeln!(broken, "coordinator: [not, a, map]").unwrap();
        assert!(Config::try_load(broken.path()).is_none());

        let mut good = NamedTempFile::new().unwrap();
        writeln!(good, "demo:\n  requests: 3\n  give-up-after-ms: 2500").unwrap();
        let config = Config::try_load(good.path()).unwrap();
        assert_eq!(config.demo.requests, 3);
        assert_eq!(config.demo.give_up_after_ms, Some(2500));
    }

    #[test]
    fn test_validate_rejects_bad_window() {
        let mut config = Config::default();
        config.coordinator.max_in_flight = 2;
        config.coordinator.min_in_flight = Some(5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roundtrip_keeps_kebab_keys() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("max-in-flight"));
        assert!(yaml.contains("service-time-ms"));
        assert!(!yaml.contains("log-level"));
    }
}
