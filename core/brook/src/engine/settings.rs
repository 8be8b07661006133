//! Engine settings, read from the optional configuration file.
//!
//! The file is written in TOML. Only the `[engine]` table is read here,
//! other tables are ignored:
//!
//! ```toml
//! [engine]
//! channel_size = 1024
//! buffer_limit = 10000
//! shutdown_timeout = "5s"
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::EngineError;

/// Tuning of the engine, which does not depend on the plugins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineSettings {
    /// How many records can wait in the channel between the inputs and the flush task.
    pub channel_size: usize,
    /// Maximum number of records kept between two flushes. Older records are dropped first.
    pub buffer_limit: usize,
    /// How long to wait for the engine to drain after a shutdown request.
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            channel_size: 1024,
            buffer_limit: 10_000,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Deserialize, Default)]
struct SettingsFile {
    #[serde(default)]
    engine: EngineSettings,
}

impl EngineSettings {
    /// Loads the settings from the configuration file, if any.
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        log::debug!("Loading engine settings from {}", path.display());
        let wrap = |cause: anyhow::Error| EngineError::InvalidSettings {
            path: path.to_path_buf(),
            cause,
        };
        let content = std::fs::read_to_string(path)
            .context("could not read the file")
            .map_err(wrap)?;
        Self::from_toml_str(&content).map_err(wrap)
    }

    /// Parses the settings from the content of a TOML file.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let file: SettingsFile = toml::from_str(content).context("invalid TOML")?;
        let settings = file.engine;
        anyhow::ensure!(settings.channel_size > 0, "channel_size must be at least 1");
        anyhow::ensure!(settings.buffer_limit > 0, "buffer_limit must be at least 1");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::EngineSettings;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(EngineSettings::from_toml_str("").unwrap(), EngineSettings::default());
        let other_tables = indoc! {r#"
            [service]
            name = "whatever"
        "#};
        assert_eq!(EngineSettings::from_toml_str(other_tables).unwrap(), EngineSettings::default());
    }

    #[test]
    fn partial_engine_table() {
        let content = indoc! {r#"
            [engine]
            shutdown_timeout = "250ms"
        "#};
        let settings = EngineSettings::from_toml_str(content).unwrap();
        assert_eq!(settings.shutdown_timeout, Duration::from_millis(250));
        assert_eq!(settings.channel_size, EngineSettings::default().channel_size);
    }

    #[test]
    fn invalid_settings() {
        assert!(EngineSettings::from_toml_str("[engine]\nchannel_size = 0").is_err());
        assert!(EngineSettings::from_toml_str("[engine]\nunknown_key = 1").is_err());
        assert!(EngineSettings::from_toml_str("this is not toml").is_err());
    }

    #[test]
    fn load_without_file() {
        assert_eq!(EngineSettings::load(None).unwrap(), EngineSettings::default());
    }
}
