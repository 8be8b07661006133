//! Checks that run once, after the compilation and before anything starts.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::PipelineConfig;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("config file unreadable: {}", .path.display())]
    ConfigFileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid flush interval: {0} (it must be at least 1 second)")]
    InvalidFlushInterval(i64),
    #[error("no input defined, use --input NAME")]
    NoInputDefined,
}

/// Validates the pipeline configuration.
///
/// The checks are done in a fixed order and the first failure is returned:
/// 1. the config file, if any, can be read;
/// 2. the flush interval is positive;
/// 3. there is at least one input.
pub fn validate(config: &PipelineConfig) -> Result<(), ValidationError> {
    if let Some(path) = &config.config_file {
        check_readable(path).map_err(|source| ValidationError::ConfigFileUnreadable {
            path: path.clone(),
            source,
        })?;
    }
    if config.flush_interval_secs < 1 {
        return Err(ValidationError::InvalidFlushInterval(config.flush_interval_secs));
    }
    if config.inputs.is_empty() {
        return Err(ValidationError::NoInputDefined);
    }
    Ok(())
}

/// Opens the file without reading it. Directories can be opened, but not read.
fn check_readable(path: &Path) -> io::Result<()> {
    let file = File::open(path)?;
    if file.metadata()?.is_dir() {
        return Err(io::Error::new(io::ErrorKind::IsADirectory, "is a directory"));
    }
    Ok(())
}
