//! The engine runs the pipeline described by a [`PipelineConfig`].
//!
//! Inputs are polled on Tokio tasks, their records go through a channel to a single
//! flush task, which buffers them and delivers them to the outputs at every flush interval.
//!
//! ```text
//! input task --\
//! input task ---+--> channel --> flush task --> outputs (filtered by `match`)
//! input task --/
//! ```
//!
//! The engine stops when its [`EngineHandle::shutdown`] is called: inputs stop, the flush task
//! performs a last flush, then the outputs are closed.

use std::time::Duration;

use tokio::runtime::{self, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{InstanceId, PipelineConfig, PluginRef};
use crate::plugin::registry::StaticRegistry;

mod error;
mod matching;
mod record;
mod run;
mod settings;

pub use error::{CollectError, EngineError, WriteError, WriteRetry};
pub use matching::TagPattern;
pub use record::{Fields, Record, RecordBuffer};
pub use settings::EngineSettings;

/// Generic property of inputs: the tag of the records.
pub const PROP_TAG: &str = "tag";
/// Generic property of outputs: the pattern that selects the records to write.
pub const PROP_MATCH: &str = "match";
/// Generic property of inputs: how often the input is polled.
pub const PROP_INTERVAL: &str = "interval";

const DEFAULT_COLLECT_INTERVAL: Duration = Duration::from_secs(1);

/// Produces records.
pub trait Input: Send {
    /// Collects the records that are available now.
    ///
    /// This method is called periodically, it should not block.
    fn collect(&mut self, records: &mut RecordBuffer) -> Result<(), CollectError>;
}

/// Exports records to an external entity, like a terminal, a file or a database.
pub trait Output: Send {
    /// Writes the records selected by the `match` pattern of the output.
    fn write(&mut self, records: &[&Record]) -> Result<(), WriteError>;

    /// Called once, after the last flush.
    fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// An input that is ready to run.
pub(crate) struct InputInstance {
    pub id: InstanceId,
    pub tag: String,
    pub interval: Duration,
    pub input: Box<dyn Input>,
}

/// An output that is ready to run.
pub(crate) struct OutputInstance {
    pub id: InstanceId,
    pub pattern: TagPattern,
    pub output: Box<dyn Output>,
}

/// Allows to stop the engine from anywhere, including another thread.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    token: CancellationToken,
}

impl EngineHandle {
    /// Requests the engine to shut down.
    ///
    /// The engine stops asynchronously, use [`RunningEngine::wait_for_shutdown`] to wait for it.
    /// Calling this method more than once has no additional effect.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A started engine.
pub struct RunningEngine {
    runtime: Runtime,
    handle: EngineHandle,
    main_task: JoinHandle<Result<(), EngineError>>,
    settings: EngineSettings,
}

/// Starts the engine.
///
/// The plugin instances of the configuration are initialized with their properties,
/// then the tasks are spawned on a new multi-threaded Tokio runtime.
pub fn start(config: PipelineConfig, registry: &StaticRegistry) -> Result<RunningEngine, EngineError> {
    let settings = EngineSettings::load(config.config_file.as_deref())?;

    let inputs = config
        .inputs
        .into_iter()
        .map(|p| init_input(p, registry))
        .collect::<Result<Vec<_>, _>>()?;
    let outputs = config
        .outputs
        .into_iter()
        .map(|p| init_output(p, registry))
        .collect::<Result<Vec<_>, _>>()?;

    let runtime = runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("brook-engine")
        .build()?;

    let token = CancellationToken::new();
    let flush_interval = Duration::from_secs(config.flush_interval_secs.max(1) as u64);
    log::info!(
        "Starting the engine with {} input(s) and {} output(s), flushing every {}s",
        inputs.len(),
        outputs.len(),
        flush_interval.as_secs()
    );
    let main_task = runtime.spawn(run::run_pipeline(
        inputs,
        outputs,
        flush_interval,
        settings.clone(),
        token.clone(),
    ));
    Ok(RunningEngine {
        runtime,
        handle: EngineHandle { token },
        main_task,
        settings,
    })
}

fn init_input(plugin: PluginRef, registry: &StaticRegistry) -> Result<InputInstance, EngineError> {
    let PluginRef { id, mut properties, .. } = plugin.clone();
    let init_err = |cause| EngineError::PluginInit { id: id.clone(), cause };

    let tag = properties.take(PROP_TAG).unwrap_or_else(|| id.to_string());
    let interval = properties
        .take_duration(PROP_INTERVAL)
        .map_err(init_err)?
        .unwrap_or(DEFAULT_COLLECT_INTERVAL);
    if interval.is_zero() {
        return Err(init_err(anyhow::anyhow!("the collect interval cannot be zero")));
    }
    let input = registry.build_input(&plugin, &mut properties).map_err(init_err)?;
    check_no_leftover(&id, properties.keys())?;
    log::debug!("{id} initialized with tag '{tag}'");
    Ok(InputInstance {
        id,
        tag,
        interval,
        input,
    })
}

fn init_output(plugin: PluginRef, registry: &StaticRegistry) -> Result<OutputInstance, EngineError> {
    let PluginRef { id, mut properties, .. } = plugin.clone();

    let pattern = match properties.take(PROP_MATCH) {
        Some(pattern) => pattern
            .parse()
            .map_err(|_| EngineError::InvalidMatch { id: id.clone(), pattern })?,
        None => TagPattern::Any,
    };
    let output = registry
        .build_output(&plugin, &mut properties)
        .map_err(|cause| EngineError::PluginInit { id: id.clone(), cause })?;
    check_no_leftover(&id, properties.keys())?;
    log::debug!("{id} initialized with pattern {pattern:?}");
    Ok(OutputInstance { id, pattern, output })
}

fn check_no_leftover<'a>(id: &InstanceId, keys: impl Iterator<Item = &'a str>) -> Result<(), EngineError> {
    let keys: Vec<String> = keys.map(ToOwned::to_owned).collect();
    if keys.is_empty() {
        Ok(())
    } else {
        Err(EngineError::UnknownProperties { id: id.clone(), keys })
    }
}

impl RunningEngine {
    /// Returns a handle that can stop the engine.
    pub fn control_handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Returns a handle to the Tokio runtime of the engine.
    pub fn runtime_handle(&self) -> &runtime::Handle {
        self.runtime.handle()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Blocks the current thread until the engine stops, or until `timeout` elapses.
    ///
    /// Use `Duration::MAX` to wait forever.
    pub fn wait_for_shutdown(self, timeout: Duration) -> Result<(), EngineError> {
        let RunningEngine { runtime, main_task, .. } = self;
        let res = runtime.block_on(async { tokio::time::timeout(timeout, main_task).await });
        // Background tasks that are still running (e.g. blocking reads) must not prevent the exit.
        runtime.shutdown_timeout(Duration::from_millis(100));
        match res {
            Ok(joined) => joined?,
            Err(_elapsed) => Err(EngineError::Timeout(timeout)),
        }
    }
}
