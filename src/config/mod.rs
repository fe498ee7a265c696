//! Runtime settings, loaded from a JSON file.
//!
//! Nothing in the library reads settings on its own; callers load them and
//! pass the values on.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitor::{DEFAULT_HISTORY_RETENTION, DEFAULT_UPDATE_INTERVAL};
use crate::serial::{DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub serial_port: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    pub logfile_name: PathBuf,
    pub update_interval_ms: u64,
    pub history_retention: usize,
    /// Mirror every byte on the wire to the `maxigauge::wire` log target.
    pub trace_wire: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            logfile_name: PathBuf::from("measurement-data.txt"),
            update_interval_ms: DEFAULT_UPDATE_INTERVAL.as_millis() as u64,
            history_retention: DEFAULT_HISTORY_RETENTION,
            trace_wire: false,
        }
    }
}

impl Settings {
    /// Read and validate settings. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&contents)?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.serial_port.trim().is_empty() {
            return Err(ConfigError::Invalid("serial_port must not be empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be positive".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be positive".into()));
        }
        if self.update_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "update_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.serial_port, "/dev/ttyUSB0");
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.timeout(), Duration::from_millis(200));
        assert_eq!(settings.update_interval(), Duration::from_millis(400));
        assert_eq!(settings.history_retention, 75);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = Settings::from_json(r#"{"serial_port": "/dev/ttyS1", "trace_wire": true}"#)
            .unwrap();
        assert_eq!(settings.serial_port, "/dev/ttyS1");
        assert!(settings.trace_wire);
        assert_eq!(settings.logfile_name, PathBuf::from("measurement-data.txt"));
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            Settings::from_json(r#"{"baud_rate": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Settings::from_json(r#"{"serial_port": " "}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Settings::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"update_interval_ms": 1000}}"#).unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.update_interval(), Duration::from_secs(1));

        assert!(matches!(
            Settings::load("/nonexistent/settings.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
