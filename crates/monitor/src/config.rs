//! Monitor configuration
//!
//! Loaded from an optional TOML file, then `DROWSY__*` environment
//! variables (`DROWSY__DMS__EAR_THRESHOLD=0.22`, `DROWSY__LINK__PORT=COM4`).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use alert_link::LinkConfig;
use config::{Config, ConfigError, Environment, File};
use dms::DmsConfig;
use serde::{Deserialize, Serialize};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DROWSY";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Landmark recording to replay as the landmark provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Newline-delimited JSON landmark frames
    pub path: Option<PathBuf>,
    /// Playback rate
    pub fps: f32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { path: None, fps: 30.0 }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub dms: DmsConfig,
    pub link: LinkConfig,
    /// Alcohol reading at or above which the driver is flagged
    pub alcohol_limit: i32,
    /// Camera index, handed to the capture collaborator untouched
    pub camera_index: u32,
    pub replay: ReplayConfig,
    pub log: LogConfig,
    /// Prometheus exporter listen address
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            dms: DmsConfig::default(),
            link: LinkConfig::default(),
            alcohol_limit: 400,
            camera_index: 0,
            replay: ReplayConfig::default(),
            log: LogConfig::default(),
            metrics_addr: None,
        }
    }
}

impl MonitorConfig {
    /// Load from `path` (if given) with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(env.prefix_separator("__").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env() -> Environment {
        Environment::with_prefix(ENV_PREFIX).source(Some(HashMap::new()))
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = MonitorConfig::load_with_env(None, no_env()).unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.dms.ear_threshold, 0.20);
        assert_eq!(config.dms.consec_frames, 48);
        assert_eq!(config.link.baud_rate, 9600);
        assert_eq!(config.alcohol_limit, 400);
    }

    #[test]
    fn test_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "alcohol_limit = 350\n\n[dms]\nconsec_frames = 30\n\n[link]\nport = \"/dev/ttyACM0\"\nenabled = false"
        )
        .unwrap();

        let config = MonitorConfig::load_with_env(Some(file.path()), no_env()).unwrap();
        assert_eq!(config.alcohol_limit, 350);
        assert_eq!(config.dms.consec_frames, 30);
        assert_eq!(config.dms.ear_threshold, 0.20);
        assert_eq!(config.link.port.as_deref(), Some("/dev/ttyACM0"));
        assert!(!config.link.enabled);
    }

    #[test]
    fn test_env_overrides() {
        let vars = HashMap::from([
            ("DROWSY__DMS__EAR_THRESHOLD".to_string(), "0.22".to_string()),
            ("DROWSY__LINK__BAUD_RATE".to_string(), "115200".to_string()),
        ]);
        let env = Environment::with_prefix(ENV_PREFIX).source(Some(vars));
        let config = MonitorConfig::load_with_env(None, env).unwrap();
        assert!((config.dms.ear_threshold - 0.22).abs() < 1e-6);
        assert_eq!(config.link.baud_rate, 115200);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = MonitorConfig::load_with_env(Some(Path::new("/no/such/monitor.toml")), no_env());
        assert!(result.is_err());
    }
}
