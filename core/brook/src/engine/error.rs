use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::InstanceId;

/// Error which can occur during [`Input::collect`](super::Input::collect).
#[derive(Debug)]
pub enum CollectError {
    /// Collecting failed and the input cannot recover from this failure, it should be stopped.
    Fatal(anyhow::Error),
    /// The error is temporary, collecting again may work.
    CanRetry(anyhow::Error),
    /// The input has nothing more to collect, and this is expected.
    ///
    /// For instance, the standard input has been closed.
    NormalStop,
}

/// Error which can occur during [`Output::write`](super::Output::write).
#[derive(Debug)]
pub enum WriteError {
    /// The records could not be written properly, and the output cannot be used anymore.
    Fatal(anyhow::Error),
    /// The error is temporary, writing again may work.
    ///
    /// The records of the failed flush are not written again.
    CanRetry(anyhow::Error),
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::Fatal(e) => write!(f, "fatal error in Input::collect: {e}"),
            CollectError::CanRetry(e) => write!(f, "collecting failed (but could work later): {e}"),
            CollectError::NormalStop => write!(f, "the input stopped in an expected way (it's fine)"),
        }
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::Fatal(e) => write!(f, "fatal error in Output::write: {e}"),
            WriteError::CanRetry(e) => write!(f, "writing failed (but could work later): {e}"),
        }
    }
}

// Allow to convert from anyhow::Error to element errors

impl<T: Into<anyhow::Error>> From<T> for CollectError {
    fn from(value: T) -> Self {
        Self::Fatal(value.into())
    }
}

impl<T: Into<anyhow::Error>> From<T> for WriteError {
    fn from(value: T) -> Self {
        Self::Fatal(value.into())
    }
}

/// Adds the convenient method `error.retry_write()`.
pub trait WriteRetry<T> {
    fn retry_write(self) -> Result<T, WriteError>;
}

impl<T, E: Into<anyhow::Error>> WriteRetry<T> for Result<T, E> {
    /// Turns this error into [`WriteError::CanRetry`].
    fn retry_write(self) -> Result<T, WriteError> {
        self.map_err(|e| WriteError::CanRetry(e.into()))
    }
}

/// Error that prevents the engine from starting or stopping properly.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine settings in {}", path.display())]
    InvalidSettings {
        path: PathBuf,
        #[source]
        cause: anyhow::Error,
    },
    #[error("failed to initialize {id}")]
    PluginInit {
        id: InstanceId,
        #[source]
        cause: anyhow::Error,
    },
    #[error("unknown properties for {id}: {}", keys.join(", "))]
    UnknownProperties { id: InstanceId, keys: Vec<String> },
    #[error("invalid match pattern for {id}: '{pattern}'")]
    InvalidMatch { id: InstanceId, pattern: String },
    #[error("failed to build the async runtime")]
    Runtime(#[from] std::io::Error),
    #[error("input {id} failed")]
    InputFailed {
        id: InstanceId,
        #[source]
        cause: anyhow::Error,
    },
    #[error("an engine task panicked or was cancelled")]
    Join(#[from] tokio::task::JoinError),
    #[error("the engine did not stop within {0:?}")]
    Timeout(Duration),
}
