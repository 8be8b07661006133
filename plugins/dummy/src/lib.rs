//! The `dummy` input, which emits the same record again and again.
//!
//! Properties:
//! - `message`: the record, as a JSON object. Default: `{"message":"dummy"}`
//! - `rate`: how many records to emit at each collect. Default: 1

use anyhow::Context;
use brook::config::Properties;
use brook::engine::{CollectError, Fields, Input, RecordBuffer};
use brook::plugin::InputPlugin;

const DEFAULT_MESSAGE: &str = r#"{"message":"dummy"}"#;

pub struct DummyInput {
    fields: Fields,
    rate: usize,
}

impl DummyInput {
    pub fn new(message: &str, rate: usize) -> anyhow::Result<Self> {
        let fields: Fields =
            serde_json::from_str(message).with_context(|| format!("message is not a JSON object: {message}"))?;
        anyhow::ensure!(rate > 0, "rate must be at least 1");
        Ok(Self { fields, rate })
    }
}

impl Input for DummyInput {
    fn collect(&mut self, records: &mut RecordBuffer) -> Result<(), CollectError> {
        for _ in 0..self.rate {
            records.push(self.fields.clone());
        }
        Ok(())
    }
}

impl InputPlugin for DummyInput {
    fn name() -> &'static str {
        "dummy"
    }

    fn description() -> &'static str {
        "Generate dummy records"
    }

    fn init(properties: &mut Properties) -> anyhow::Result<Self> {
        let message = properties.take("message");
        let rate = properties.take_parsed::<usize>("rate")?.unwrap_or(1);
        let input = DummyInput::new(message.as_deref().unwrap_or(DEFAULT_MESSAGE), rate)?;
        log::debug!("dummy input: {} record(s) per collect", input.rate);
        Ok(input)
    }
}
