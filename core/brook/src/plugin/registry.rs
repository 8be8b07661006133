//! Creation of plugin instances by name.

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use super::{suggest, Factory, InputFactory, OutputFactory, PluginMetadata};
use crate::config::{InstanceId, PluginKind, PluginRef, Properties};
use crate::engine::{Input, Output};

/// Creates plugin instances and applies their properties.
///
/// The option compiler only depends on this trait, which makes it easy to test
/// with a fake registry.
pub trait PluginRegistry {
    /// Creates a new instance of the plugin `name`, which must be of the given kind.
    fn create_instance(&self, kind: PluginKind, name: &str) -> Result<PluginRef, RegistryError>;

    /// Applies a property to an instance.
    fn set_property(&self, instance: &mut PluginRef, key: &str, value: &str) -> Result<(), RegistryError>;

    /// Lists the `(name, description)` of the plugins of the given kind, hidden plugins excepted.
    fn list_registered(&self, kind: PluginKind) -> Vec<(&str, &str)>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown {kind} plugin '{name}'{}", hint(.suggestion))]
    UnknownPlugin {
        kind: PluginKind,
        name: String,
        suggestion: Option<String>,
    },
    #[error("property key cannot be empty")]
    EmptyKey,
}

fn hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(", did you mean '{s}'?"),
        None => String::new(),
    }
}

/// Registry of the plugins that are embedded in the agent binary.
pub struct StaticRegistry {
    inputs: Catalog<InputFactory>,
    outputs: Catalog<OutputFactory>,
}

/// The plugins of one kind, with their factories.
struct Catalog<F> {
    kind: PluginKind,
    plugins: Vec<RegisteredPlugin<F>>,
}

struct RegisteredPlugin<F> {
    name: String,
    description: String,
    hidden: bool,
    factory: F,
    /// How many instances have been created so far.
    instances: AtomicUsize,
}

impl<F: Copy> Catalog<F> {
    fn new(kind: PluginKind) -> Self {
        Self {
            kind,
            plugins: Vec::new(),
        }
    }

    fn register(&mut self, name: String, description: String, hidden: bool, factory: F) {
        if let Some(pos) = self.plugins.iter().position(|p| p.name == name) {
            log::warn!("{} plugin '{name}' registered twice, keeping the last one", self.kind);
            self.plugins.remove(pos);
        }
        self.plugins.push(RegisteredPlugin {
            name,
            description,
            hidden,
            factory,
            instances: AtomicUsize::new(0),
        });
    }

    fn find(&self, name: &str) -> Result<&RegisteredPlugin<F>, RegistryError> {
        match self.plugins.iter().find(|p| p.name == name) {
            Some(plugin) => Ok(plugin),
            None => {
                let candidates = self.visible().map(|p| p.name.as_str());
                Err(RegistryError::UnknownPlugin {
                    kind: self.kind,
                    name: name.to_owned(),
                    suggestion: suggest::closest(name, candidates).map(ToOwned::to_owned),
                })
            }
        }
    }

    fn factory(&self, name: &str) -> Result<F, RegistryError> {
        self.find(name).map(|p| p.factory)
    }

    fn next_id(&self, name: &str) -> Result<InstanceId, RegistryError> {
        let plugin = self.find(name)?;
        let seq = plugin.instances.fetch_add(1, Ordering::Relaxed);
        Ok(InstanceId::new(name, seq))
    }

    fn visible(&self) -> impl Iterator<Item = &RegisteredPlugin<F>> {
        self.plugins.iter().filter(|p| !p.hidden)
    }
}

impl StaticRegistry {
    /// Registers the given plugins and the hidden `lib` input.
    pub fn new(plugins: Vec<PluginMetadata>) -> Self {
        let mut registry = Self::empty();
        registry.register(PluginMetadata::input::<super::lib_input::LibInput>().hidden());
        for p in plugins {
            registry.register(p);
        }
        registry
    }

    /// Creates a registry without any plugin.
    pub fn empty() -> Self {
        Self {
            inputs: Catalog::new(PluginKind::Input),
            outputs: Catalog::new(PluginKind::Output),
        }
    }

    /// Registers a plugin.
    ///
    /// If a plugin of the same kind and name is already registered, it is replaced.
    pub fn register(&mut self, metadata: PluginMetadata) {
        let PluginMetadata {
            name,
            description,
            hidden,
            factory,
        } = metadata;
        match factory {
            Factory::Input(init) => self.inputs.register(name, description, hidden, init),
            Factory::Output(init) => self.outputs.register(name, description, hidden, init),
        }
    }

    /// Builds the input described by `plugin`, with the given properties.
    pub(crate) fn build_input(&self, plugin: &PluginRef, properties: &mut Properties) -> anyhow::Result<Box<dyn Input>> {
        let init = self.inputs.factory(&plugin.name)?;
        init(properties)
    }

    /// Builds the output described by `plugin`, with the given properties.
    pub(crate) fn build_output(
        &self,
        plugin: &PluginRef,
        properties: &mut Properties,
    ) -> anyhow::Result<Box<dyn Output>> {
        let init = self.outputs.factory(&plugin.name)?;
        init(properties)
    }
}

impl PluginRegistry for StaticRegistry {
    fn create_instance(&self, kind: PluginKind, name: &str) -> Result<PluginRef, RegistryError> {
        let id = match kind {
            PluginKind::Input => self.inputs.next_id(name)?,
            PluginKind::Output => self.outputs.next_id(name)?,
        };
        log::debug!("created {kind} instance {id}");
        Ok(PluginRef::new(kind, name, id))
    }

    fn set_property(&self, instance: &mut PluginRef, key: &str, value: &str) -> Result<(), RegistryError> {
        if key.is_empty() {
            return Err(RegistryError::EmptyKey);
        }
        if let Some(previous) = instance.properties.set(key, value) {
            log::debug!("{}: property '{key}' changed from '{previous}' to '{value}'", instance.id);
        }
        Ok(())
    }

    fn list_registered(&self, kind: PluginKind) -> Vec<(&str, &str)> {
        fn listing<F: Copy>(catalog: &Catalog<F>) -> Vec<(&str, &str)> {
            catalog
                .visible()
                .map(|p| (p.name.as_str(), p.description.as_str()))
                .collect()
        }
        match kind {
            PluginKind::Input => listing(&self.inputs),
            PluginKind::Output => listing(&self.outputs),
        }
    }
}
