//! Pipeline configuration: what the engine needs to know to run.

use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// Default flush interval, in seconds.
pub const DEFAULT_FLUSH_SECS: i64 = 5;

/// The two kinds of plugins that can be instantiated in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Input,
    Output,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginKind::Input => f.write_str("input"),
            PluginKind::Output => f.write_str("output"),
        }
    }
}

/// Identifier of a plugin instance, assigned by the registry.
///
/// It is displayed as `<plugin>.<n>`, where `n` counts the instances of the same plugin,
/// for instance `dummy.0` and `dummy.1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId {
    plugin: String,
    seq: usize,
}

impl InstanceId {
    pub fn new(plugin: impl Into<String>, seq: usize) -> Self {
        Self {
            plugin: plugin.into(),
            seq,
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.plugin, self.seq)
    }
}

/// Key/value settings of a plugin instance.
///
/// Setting a key twice replaces the previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property, returning the previous value if there was one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Removes a property and returns its value.
    ///
    /// Plugins take the properties they understand during their initialization.
    /// What remains afterwards is reported as unknown.
    pub fn take(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Removes a property and parses its value with [`FromStr`].
    pub fn take_parsed<T>(&mut self, key: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.take(key)
            .map(|v| {
                v.parse::<T>()
                    .with_context(|| format!("invalid value for property '{key}': '{v}'"))
            })
            .transpose()
    }

    /// Removes a property and parses it as a human-friendly duration, like `1s` or `250ms`.
    pub fn take_duration(&mut self, key: &str) -> anyhow::Result<Option<Duration>> {
        self.take(key)
            .map(|v| {
                humantime::parse_duration(&v).with_context(|| format!("invalid duration for property '{key}': '{v}'"))
            })
            .transpose()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A plugin instance that has been created by the registry but not started yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRef {
    pub kind: PluginKind,
    pub name: String,
    pub id: InstanceId,
    pub properties: Properties,
}

impl PluginRef {
    pub fn new(kind: PluginKind, name: impl Into<String>, id: InstanceId) -> Self {
        Self {
            kind,
            name: name.into(),
            id,
            properties: Properties::new(),
        }
    }
}

/// Validated (or about to be validated) configuration of the pipeline.
///
/// The configuration is built by the option compiler, then moved into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub flush_interval_secs: i64,
    pub verbose: bool,
    pub daemon: bool,
    pub config_file: Option<PathBuf>,
    pub inputs: Vec<PluginRef>,
    pub outputs: Vec<PluginRef>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: DEFAULT_FLUSH_SECS,
            verbose: false,
            daemon: false,
            config_file: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Returns the flush interval as a `Duration`.
    ///
    /// Non-positive values are rejected by the validator, they are clamped to zero here.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(0) as u64)
    }

    /// Describes the resolved setup, in a human-readable form.
    pub fn setup_summary(&self) -> String {
        fn instances(out: &mut String, title: &str, plugins: &[PluginRef]) -> fmt::Result {
            writeln!(out, "[{title}]")?;
            if plugins.is_empty() {
                writeln!(out, "    (none)")?;
            }
            for p in plugins {
                writeln!(out, "    {} ({})", p.id, p.name)?;
                for (key, value) in p.properties.iter() {
                    writeln!(out, "        {key} = {value}")?;
                }
            }
            Ok(())
        }

        let on_off = |b: bool| if b { "on" } else { "off" };
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "[service]");
        let _ = writeln!(out, "    flush interval : {} seconds", self.flush_interval_secs);
        let _ = writeln!(out, "    daemon         : {}", on_off(self.daemon));
        let _ = writeln!(out, "    verbose        : {}", on_off(self.verbose));
        let _ = match &self.config_file {
            Some(path) => writeln!(out, "    config file    : {}", path.display()),
            None => writeln!(out, "    config file    : none"),
        };
        let _ = instances(&mut out, "inputs", &self.inputs);
        let _ = instances(&mut out, "outputs", &self.outputs);
        out
    }
}

/// Position of a plugin instance in a [`ConfigBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    kind: PluginKind,
    index: usize,
}

/// Owns the in-progress configuration while the command-line tokens are compiled.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: PipelineConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.config.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn daemon(&mut self, daemon: bool) -> &mut Self {
        self.config.daemon = daemon;
        self
    }

    pub fn verbose(&mut self, verbose: bool) -> &mut Self {
        self.config.verbose = verbose;
        self
    }

    pub fn flush_interval_secs(&mut self, secs: i64) -> &mut Self {
        self.config.flush_interval_secs = secs;
        self
    }

    /// Appends a plugin instance to the inputs or outputs, depending on its kind.
    pub fn add_instance(&mut self, plugin: PluginRef) -> Handle {
        let kind = plugin.kind;
        let list = self.instances_mut(kind);
        list.push(plugin);
        Handle {
            kind,
            index: list.len() - 1,
        }
    }

    /// Returns the instance pointed to by `handle`.
    ///
    /// # Panics
    /// Panics if the handle has not been produced by this builder.
    pub fn instance_mut(&mut self, handle: Handle) -> &mut PluginRef {
        &mut self.instances_mut(handle.kind)[handle.index]
    }

    fn instances_mut(&mut self, kind: PluginKind) -> &mut Vec<PluginRef> {
        match kind {
            PluginKind::Input => &mut self.config.inputs,
            PluginKind::Output => &mut self.config.outputs,
        }
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
