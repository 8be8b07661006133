//! The `stdout` output prints the records to the standard output.
//!
//! Properties:
//! - `format`: `plain` (default) or `json`

use std::io::{self, ErrorKind, Write};
use std::str::FromStr;

use anyhow::anyhow;
use brook::config::Properties;
use brook::engine::{Output, Record, WriteError, WriteRetry};
use brook::plugin::OutputPlugin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `[n] tag: [timestamp, {fields}]`
    Plain,
    /// One JSON object per line.
    Json,
}

impl FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Format::Plain),
            "json" => Ok(Format::Json),
            _ => Err(anyhow!("unsupported format '{s}', expected 'plain' or 'json'")),
        }
    }
}

pub struct StdoutOutput {
    format: Format,
    writer: Box<dyn Write + Send>,
    /// Number of records written so far, displayed in the plain format.
    count: u64,
}

impl StdoutOutput {
    pub fn new(format: Format, writer: Box<dyn Write + Send>) -> Self {
        Self {
            format,
            writer,
            count: 0,
        }
    }

    fn write_record(&mut self, record: &Record) -> io::Result<()> {
        match self.format {
            Format::Plain => {
                let fields = serde_json::to_string(&record.fields)?;
                writeln!(
                    self.writer,
                    "[{}] {}: [{:.6}, {fields}]",
                    self.count,
                    record.tag,
                    record.unix_time()
                )?;
            }
            Format::Json => {
                serde_json::to_writer(&mut self.writer, record)?;
                writeln!(self.writer)?;
            }
        }
        self.count += 1;
        Ok(())
    }
}

/// Interrupted and non-blocking writes can succeed at the next flush.
fn check_io(res: io::Result<()>) -> Result<(), WriteError> {
    match res {
        Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => Err(e).retry_write(),
        res => Ok(res?),
    }
}

impl Output for StdoutOutput {
    fn write(&mut self, records: &[&Record]) -> Result<(), WriteError> {
        for record in records {
            check_io(self.write_record(record))?;
        }
        check_io(self.writer.flush())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl OutputPlugin for StdoutOutput {
    fn name() -> &'static str {
        "stdout"
    }

    fn description() -> &'static str {
        "Print records to the standard output"
    }

    fn init(properties: &mut Properties) -> anyhow::Result<Self> {
        let format = match properties.take("format") {
            Some(f) => f.parse()?,
            None => Format::Plain,
        };
        Ok(StdoutOutput::new(format, Box::new(io::stdout())))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    use brook::config::Properties;
    use brook::engine::{Fields, Output, Record, WriteError};
    use brook::plugin::OutputPlugin;
    use pretty_assertions::assert_eq;

    use super::{Format, StdoutOutput};

    /// A writer that can be inspected after being moved into the output.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes).lines().map(String::from).collect()
        }
    }

    /// A writer that accepts everything but fails to flush.
    struct FailingWriter(io::ErrorKind);

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(self.0))
        }
    }

    fn record(tag: &str, msg: &str) -> Record {
        let mut fields = Fields::new();
        fields.insert(String::from("msg"), msg.into());
        Record::new(tag, fields)
    }

    #[test]
    fn plain() {
        let buf = SharedBuf::default();
        let mut out = StdoutOutput::new(Format::Plain, Box::new(buf.clone()));
        let (a, b) = (record("app", "hello"), record("app", "world"));
        out.write(&[&a, &b]).unwrap();

        let lines = buf.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[0] app: ["), "{}", lines[0]);
        assert!(lines[0].ends_with(r#", {"msg":"hello"}]"#), "{}", lines[0]);
        assert!(lines[1].starts_with("[1] app: ["), "{}", lines[1]);
    }

    #[test]
    fn json() {
        let buf = SharedBuf::default();
        let mut out = StdoutOutput::new(Format::Json, Box::new(buf.clone()));
        out.write(&[&record("sys", "boot")]).unwrap();
        out.close().unwrap();

        let lines = buf.lines();
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["tag"], "sys");
        assert_eq!(value["fields"]["msg"], "boot");
        assert!(value["timestamp"].is_f64());
    }

    #[test]
    fn format_property() {
        let mut props = Properties::new();
        props.set("format", "json");
        StdoutOutput::init(&mut props).unwrap();

        let mut props = Properties::new();
        props.set("format", "xml");
        assert!(StdoutOutput::init(&mut props).is_err());
    }

    #[test]
    fn temporary_errors_can_be_retried() {
        for kind in [io::ErrorKind::Interrupted, io::ErrorKind::WouldBlock] {
            let mut out = StdoutOutput::new(Format::Json, Box::new(FailingWriter(kind)));
            let res = out.write(&[&record("app", "hello")]);
            assert!(matches!(res, Err(WriteError::CanRetry(_))), "{kind:?}: {res:?}");
        }

        let mut out = StdoutOutput::new(Format::Plain, Box::new(FailingWriter(io::ErrorKind::BrokenPipe)));
        let res = out.write(&[&record("app", "hello")]);
        assert!(matches!(res, Err(WriteError::Fatal(_))), "{res:?}");
    }
}
