//! The `stdin` input reads the standard input, line by line.
//!
//! Each line becomes a record with a single field, `log`.
//! The input stops when the standard input is closed.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use anyhow::Context;
use brook::config::Properties;
use brook::engine::{CollectError, Input, RecordBuffer};
use brook::plugin::InputPlugin;

const FIELD: &str = "log";

pub struct StdinInput {
    lines: Receiver<String>,
}

impl StdinInput {
    /// Reads the lines of `reader` on a background thread.
    ///
    /// `collect` must not block, so reading is done elsewhere.
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(String::from("brook-stdin"))
            .spawn(move || {
                for line in reader.lines() {
                    match line {
                        Ok(line) => {
                            if tx.send(line).is_err() {
                                // the input has been dropped
                                break;
                            }
                        }
                        Err(e) => {
                            log::error!("error while reading the standard input: {e}");
                            break;
                        }
                    }
                }
            })
            .context("could not spawn the reader thread")?;
        Ok(Self { lines: rx })
    }
}

impl Input for StdinInput {
    fn collect(&mut self, records: &mut RecordBuffer) -> Result<(), CollectError> {
        loop {
            match self.lines.try_recv() {
                Ok(line) => records.push_field(FIELD, line),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => return Err(CollectError::NormalStop),
            }
        }
    }
}

impl InputPlugin for StdinInput {
    fn name() -> &'static str {
        "stdin"
    }

    fn description() -> &'static str {
        "Read lines from the standard input"
    }

    fn init(_properties: &mut Properties) -> anyhow::Result<Self> {
        StdinInput::from_reader(io::BufReader::new(io::stdin()))
    }
}
