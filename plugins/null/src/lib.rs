//! The `null` output discards every record.

use brook::config::Properties;
use brook::engine::{Output, Record, WriteError};
use brook::plugin::OutputPlugin;

pub struct NullOutput {
    discarded: u64,
}

impl Output for NullOutput {
    fn write(&mut self, records: &[&Record]) -> Result<(), WriteError> {
        self.discarded += records.len() as u64;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        log::debug!("null output: {} record(s) discarded", self.discarded);
        Ok(())
    }
}

impl OutputPlugin for NullOutput {
    fn name() -> &'static str {
        "null"
    }

    fn description() -> &'static str {
        "Throws away records"
    }

    fn init(_properties: &mut Properties) -> anyhow::Result<Self> {
        Ok(NullOutput { discarded: 0 })
    }
}
