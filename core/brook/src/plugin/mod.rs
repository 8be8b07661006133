//! Static plugins.
//!
//! Plugins provide the [`Input`]s and [`Output`]s of the pipeline.
//! Brook does not collect nor ship anything by itself.
//!
//! ## Plugin lifecycle
//!
//! 1. **Registration**: the agent registers the metadata of every plugin it embeds,
//! with [`static_plugins!`](crate::static_plugins). Registered plugins are listed by `--help`.
//!
//! 2. **Instantiation**: each `--input NAME` or `--output NAME` flag creates a new
//! [instance](crate::config::PluginRef) through the [registry](registry::PluginRegistry).
//! The following `--prop`, `--tag` and `--match` flags set the properties of that instance.
//!
//! 3. **Initialization**: when the engine starts, [`InputPlugin::init`] or [`OutputPlugin::init`]
//! is called with the properties of the instance. The plugin takes the properties it understands.
//! Any remaining property is reported as an error, and the engine does not start.
//!
//! 4. **Operation**: inputs are polled periodically, outputs receive the records at every flush.
//!
//! 5. **Stop**: inputs are dropped, then outputs are [closed](Output::close) after the last flush.
//!
//! ## Writing a plugin
//!
//! Make a new library crate that depends on `brook` and `anyhow`, then implement
//! [`Input`] and [`InputPlugin`] (or [`Output`] and [`OutputPlugin`]):
//!
//! ```
//! use brook::config::Properties;
//! use brook::engine::{CollectError, Input, RecordBuffer};
//! use brook::plugin::InputPlugin;
//!
//! struct Hello {
//!     greeting: String,
//! }
//!
//! impl Input for Hello {
//!     fn collect(&mut self, records: &mut RecordBuffer) -> Result<(), CollectError> {
//!         records.push_field("greeting", self.greeting.clone());
//!         Ok(())
//!     }
//! }
//!
//! impl InputPlugin for Hello {
//!     fn name() -> &'static str {
//!         "hello"
//!     }
//!
//!     fn description() -> &'static str {
//!         "Says hello"
//!     }
//!
//!     fn init(properties: &mut Properties) -> anyhow::Result<Self> {
//!         let greeting = properties.take("greeting").unwrap_or_else(|| String::from("hello"));
//!         Ok(Hello { greeting })
//!     }
//! }
//! ```
//!
//! Finally, add the plugin to the `static_plugins!` list of the agent.

use crate::config::{PluginKind, Properties};
use crate::engine::{Input, Output};

pub mod lib_input;
pub mod registry;
pub(crate) mod suggest;

/// Creates a [`Vec`] containing the [`PluginMetadata`] of static plugins.
///
/// Inputs must implement [`InputPlugin`], outputs must implement [`OutputPlugin`].
///
/// # Example
/// ```ignore
/// use brook::plugin::PluginMetadata;
///
/// let plugins: Vec<PluginMetadata> = static_plugins! {
///     inputs: [DummyInput, StdinInput],
///     outputs: [StdoutOutput],
/// };
/// ```
///
/// Attributes are supported:
/// ```ignore
/// let plugins = static_plugins! {
///     inputs: [
///         #[cfg(feature = "some-feature")]
///         ConditionalInput
///     ],
///     outputs: [],
/// };
/// ```
#[macro_export]
macro_rules! static_plugins {
    (
        inputs: [$( $(#[$mi:meta])* $input:path ),* $(,)?],
        outputs: [$( $(#[$mo:meta])* $output:path ),* $(,)?] $(,)?
    ) => {
        {
            #[allow(unused_mut)]
            let mut plugins: Vec<$crate::plugin::PluginMetadata> = Vec::new();
            $(
                $(#[$mi])* // expands the attributes, if any
                plugins.push($crate::plugin::PluginMetadata::input::<$input>());
            )*
            $(
                $(#[$mo])*
                plugins.push($crate::plugin::PluginMetadata::output::<$output>());
            )*
            plugins
        }
    };
}

/// Trait for input plugins written in Rust.
pub trait InputPlugin: Input + Sized + 'static {
    /// The name of the plugin, used with `--input NAME`. It must be unique among the inputs.
    fn name() -> &'static str;

    /// One-line description, displayed by `--help`.
    fn description() -> &'static str;

    /// Initializes a new instance of the plugin from its properties.
    ///
    /// Take the properties you understand with [`Properties::take`] and friends.
    fn init(properties: &mut Properties) -> anyhow::Result<Self>;
}

/// Trait for output plugins written in Rust.
pub trait OutputPlugin: Output + Sized + 'static {
    /// The name of the plugin, used with `--output NAME`. It must be unique among the outputs.
    fn name() -> &'static str;

    /// One-line description, displayed by `--help`.
    fn description() -> &'static str;

    /// Initializes a new instance of the plugin from its properties.
    fn init(properties: &mut Properties) -> anyhow::Result<Self>;
}

pub(crate) type InputFactory = fn(&mut Properties) -> anyhow::Result<Box<dyn Input>>;
pub(crate) type OutputFactory = fn(&mut Properties) -> anyhow::Result<Box<dyn Output>>;

pub(crate) enum Factory {
    Input(InputFactory),
    Output(OutputFactory),
}

/// Plugin metadata, and a function that creates new instances of the plugin.
pub struct PluginMetadata {
    pub name: String,
    pub description: String,
    /// Hidden plugins can be used but are not listed by `--help`.
    pub hidden: bool,
    pub(crate) factory: Factory,
}

impl PluginMetadata {
    pub fn input<P: InputPlugin>() -> Self {
        Self {
            name: P::name().to_owned(),
            description: P::description().to_owned(),
            hidden: false,
            factory: Factory::Input(|props| P::init(props).map(|p| Box::new(p) as Box<dyn Input>)),
        }
    }

    pub fn output<P: OutputPlugin>() -> Self {
        Self {
            name: P::name().to_owned(),
            description: P::description().to_owned(),
            hidden: false,
            factory: Factory::Output(|props| P::init(props).map(|p| Box::new(p) as Box<dyn Output>)),
        }
    }

    /// Hides the plugin from the `--help` listing.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn kind(&self) -> PluginKind {
        match self.factory {
            Factory::Input(_) => PluginKind::Input,
            Factory::Output(_) => PluginKind::Output,
        }
    }
}

impl std::fmt::Debug for PluginMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginMetadata")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("hidden", &self.hidden)
            .finish()
    }
}
