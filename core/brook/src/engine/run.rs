//! Tasks of the engine.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{CollectError, EngineError, EngineSettings, InputInstance, OutputInstance, Record, RecordBuffer, WriteError};

/// Runs the whole pipeline until `shutdown` is cancelled.
pub(super) async fn run_pipeline(
    inputs: Vec<InputInstance>,
    outputs: Vec<OutputInstance>,
    flush_interval: Duration,
    settings: EngineSettings,
    shutdown: CancellationToken,
) -> Result<(), EngineError> {
    let (tx, rx) = mpsc::channel(settings.channel_size);

    let mut input_tasks = JoinSet::new();
    for input in inputs {
        input_tasks.spawn(run_input(input, tx.clone(), shutdown.clone()));
    }
    // Only the inputs keep a sender, so that the channel closes when they are all done.
    drop(tx);

    let flush_task = tokio::spawn(run_flush(rx, outputs, flush_interval, settings.buffer_limit, shutdown));

    // Keep track of the most recent error, so we can propagate it to the agent.
    let mut last_error: Result<(), EngineError> = Ok(());
    while let Some(res) = input_tasks.join_next().await {
        match res {
            Ok(Ok(())) => log::debug!("One input task finished without error."),
            Ok(Err(e)) => {
                log::error!("One input task finished with error: {e}");
                last_error = Err(e);
            }
            Err(e) => {
                log::error!("One input task panicked: {e:?}");
                last_error = Err(EngineError::Join(e));
            }
        }
    }
    log::debug!("All inputs have stopped, waiting for the last flush...");
    flush_task.await?;
    last_error
}

/// Polls an input periodically and sends its records to the flush task.
async fn run_input(
    mut instance: InputInstance,
    tx: mpsc::Sender<Record>,
    shutdown: CancellationToken,
) -> Result<(), EngineError> {
    let mut ticker = tokio::time::interval(instance.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let mut buf = RecordBuffer::new(instance.tag.clone());
                match instance.input.collect(&mut buf) {
                    Ok(()) => (),
                    Err(CollectError::CanRetry(e)) => {
                        log::warn!("{}: collect failed, will retry: {e:#}", instance.id);
                    }
                    Err(CollectError::NormalStop) => {
                        log::debug!("{} has nothing more to collect", instance.id);
                        send_all(buf, &tx).await;
                        break;
                    }
                    Err(CollectError::Fatal(cause)) => {
                        return Err(EngineError::InputFailed { id: instance.id, cause });
                    }
                }
                if !send_all(buf, &tx).await {
                    // the flush task is gone
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Returns `false` if the channel is closed.
async fn send_all(buf: RecordBuffer, tx: &mpsc::Sender<Record>) -> bool {
    for record in buf.into_records() {
        if tx.send(record).await.is_err() {
            return false;
        }
    }
    true
}

/// Buffers the records and delivers them to the outputs at every flush interval.
async fn run_flush(
    mut rx: mpsc::Receiver<Record>,
    mut outputs: Vec<OutputInstance>,
    flush_interval: Duration,
    buffer_limit: usize,
    shutdown: CancellationToken,
) {
    let mut buffer = RecordQueue::new(buffer_limit);
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately, skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = rx.recv() => match received {
                Some(record) => buffer.push(record),
                // every input has stopped
                None => break,
            },
            _ = ticker.tick() => flush(&mut buffer, &mut outputs),
        }
    }

    // Take what the inputs have sent before stopping.
    rx.close();
    while let Some(record) = rx.recv().await {
        buffer.push(record);
    }
    flush(&mut buffer, &mut outputs);

    for out in &mut outputs {
        if let Err(e) = out.output.close() {
            log::error!("{}: failed to close: {e:#}", out.id);
        }
    }
    log::debug!("Flush task finished.");
}

/// Writes the buffered records to the outputs and clears the buffer.
///
/// Outputs that fail with a fatal error are removed.
fn flush(buffer: &mut RecordQueue, outputs: &mut Vec<OutputInstance>) {
    if buffer.dropped > 0 {
        log::warn!(
            "{} record(s) dropped since the last flush because the buffer was full",
            buffer.dropped
        );
    }
    if buffer.records.is_empty() {
        buffer.dropped = 0;
        return;
    }
    log::trace!("flushing {} record(s)", buffer.records.len());
    outputs.retain_mut(|out| {
        let selected: Vec<&Record> = buffer.records.iter().filter(|r| out.pattern.matches(&r.tag)).collect();
        if selected.is_empty() {
            return true;
        }
        match out.output.write(&selected) {
            Ok(()) => true,
            Err(WriteError::CanRetry(e)) => {
                log::warn!("{}: {} record(s) not written: {e:#}", out.id, selected.len());
                true
            }
            Err(WriteError::Fatal(e)) => {
                log::error!("{}: fatal write error, the output is disabled: {e:#}", out.id);
                false
            }
        }
    });
    buffer.records.clear();
    buffer.dropped = 0;
}

/// Bounded queue of records: when full, the oldest record is dropped.
struct RecordQueue {
    records: VecDeque<Record>,
    limit: usize,
    dropped: usize,
}

impl RecordQueue {
    fn new(limit: usize) -> Self {
        Self {
            records: VecDeque::new(),
            limit,
            dropped: 0,
        }
    }

    fn push(&mut self, record: Record) {
        if self.records.len() >= self.limit {
            self.records.pop_front();
            self.dropped += 1;
        }
        self.records.push_back(record);
    }
}
