//! The hidden `lib` input, which receives records from the application itself.
//!
//! It is useful to embed Brook in another program, and to test the pipeline.
//!
//! # Example
//! ```
//! use brook::plugin::lib_input;
//!
//! // Create the endpoint before starting the engine,
//! // and configure the pipeline with `--input lib --prop endpoint=app`.
//! let sender = lib_input::endpoint("app");
//! sender.send_field("log", "hello").unwrap();
//! ```

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{LazyLock, Mutex};

use anyhow::{anyhow, Context};

use crate::config::Properties;
use crate::engine::{CollectError, Fields, Input, RecordBuffer};

use super::InputPlugin;

const PROP_ENDPOINT: &str = "endpoint";
const DEFAULT_ENDPOINT: &str = "default";

/// Receivers of the endpoints that have been created but not taken by an input yet.
static PENDING: LazyLock<Mutex<HashMap<String, Receiver<Fields>>>> = LazyLock::new(|| Mutex::new(HashMap::new()));

/// Sends records to a `lib` input.
#[derive(Debug, Clone)]
pub struct LibSender {
    tx: Sender<Fields>,
}

impl LibSender {
    /// Sends a record. Fails if the input has been dropped.
    pub fn send(&self, fields: Fields) -> anyhow::Result<()> {
        self.tx.send(fields).map_err(|_| anyhow!("the lib input is closed"))
    }

    /// Sends a record with a single field.
    pub fn send_field(&self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> anyhow::Result<()> {
        let mut fields = Fields::new();
        fields.insert(key.into(), value.into());
        self.send(fields)
    }
}

/// Creates a new endpoint, to be consumed by a `lib` input with the property `endpoint=<name>`.
///
/// If an endpoint with the same name has not been consumed yet, it is replaced.
pub fn endpoint(name: &str) -> LibSender {
    let (tx, rx) = mpsc::channel();
    let mut pending = PENDING.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    pending.insert(name.to_owned(), rx);
    LibSender { tx }
}

pub struct LibInput {
    rx: Receiver<Fields>,
}

impl Input for LibInput {
    fn collect(&mut self, records: &mut RecordBuffer) -> Result<(), CollectError> {
        loop {
            match self.rx.try_recv() {
                Ok(fields) => records.push(fields),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => return Err(CollectError::NormalStop),
            }
        }
    }
}

impl InputPlugin for LibInput {
    fn name() -> &'static str {
        "lib"
    }

    fn description() -> &'static str {
        "Records sent by the application"
    }

    fn init(properties: &mut Properties) -> anyhow::Result<Self> {
        let name = properties
            .take(PROP_ENDPOINT)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());
        let mut pending = PENDING.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let rx = pending
            .remove(&name)
            .with_context(|| format!("no lib endpoint named '{name}', create it with lib_input::endpoint"))?;
        Ok(LibInput { rx })
    }
}

#[cfg(test)]
mod tests {
    use super::{endpoint, LibInput};
    use crate::config::Properties;
    use crate::engine::{CollectError, Input, RecordBuffer};
    use crate::plugin::InputPlugin;

    #[test]
    fn collect_pending_records() {
        let tx = endpoint("lib-test-collect");
        let mut props = Properties::new();
        props.set("endpoint", "lib-test-collect");
        let mut input = LibInput::init(&mut props).unwrap();
        assert!(props.is_empty());

        tx.send_field("n", 1).unwrap();
        tx.send_field("n", 2).unwrap();
        let mut buf = RecordBuffer::new("lib.0");
        input.collect(&mut buf).unwrap();
        assert_eq!(buf.len(), 2);

        drop(tx);
        let mut buf = RecordBuffer::new("lib.0");
        assert!(matches!(input.collect(&mut buf), Err(CollectError::NormalStop)));
    }

    #[test]
    fn missing_endpoint() {
        let mut props = Properties::new();
        props.set("endpoint", "lib-test-does-not-exist");
        assert!(LibInput::init(&mut props).is_err());
    }
}
