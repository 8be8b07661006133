//! Compilation of the command-line tokens into a [`PipelineConfig`].
//!
//! The flags are positional: `--prop`, `--tag` and `--match` apply to the plugin instance
//! that has been created most recently by `--input` or `--output`.
//! For instance, in
//! ```text
//! --input dummy --prop rate=2 --output stdout --prop format=json
//! ```
//! `rate` is a property of the `dummy` input, and `format` a property of the `stdout` output.
//!
//! The compiler keeps track of the current target with a [`Cursor`], which is threaded through
//! a left-to-right fold of the tokens.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::{ConfigBuilder, Handle, InstanceId, PipelineConfig, PluginKind};
use crate::engine::{PROP_MATCH, PROP_TAG};
use crate::plugin::registry::{PluginRegistry, RegistryError};

/// A command-line flag and its value, in the order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Config(PathBuf),
    Daemon,
    Flush(i64),
    Input(String),
    Match(String),
    Output(String),
    Prop(String),
    Tag(String),
    Verbose,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Config(path) => write!(f, "--config {}", path.display()),
            Token::Daemon => f.write_str("--daemon"),
            Token::Flush(n) => write!(f, "--flush {n}"),
            Token::Input(name) => write!(f, "--input {name}"),
            Token::Match(pattern) => write!(f, "--match {pattern}"),
            Token::Output(name) => write!(f, "--output {name}"),
            Token::Prop(prop) => write!(f, "--prop {prop}"),
            Token::Tag(tag) => write!(f, "--tag {tag}"),
            Token::Verbose => f.write_str("--verbose"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid input '{name}'")]
    InvalidInput {
        name: String,
        #[source]
        source: RegistryError,
    },
    #[error("invalid output '{name}'")]
    InvalidOutput {
        name: String,
        #[source]
        source: RegistryError,
    },
    #[error("malformed property '{0}', expected KEY=VALUE")]
    MalformedProperty(String),
    #[error("invalid property '{key}' for {instance}")]
    InvalidProperty {
        instance: InstanceId,
        key: String,
        #[source]
        source: RegistryError,
    },
}

/// Kind of the instance that `--prop` applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    None,
    Input,
    Output,
}

/// Transient state of the compiler: which instance came into scope most recently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    scope: Scope,
    last_input: Option<Handle>,
    last_output: Option<Handle>,
}

impl Cursor {
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Applies one token to the configuration, and returns the new cursor.
    pub fn step<R: PluginRegistry + ?Sized>(
        self,
        token: Token,
        builder: &mut ConfigBuilder,
        registry: &R,
    ) -> Result<Cursor, CompileError> {
        log::trace!("compiling {token}");
        match token {
            Token::Config(path) => {
                builder.config_file(path);
            }
            Token::Daemon => {
                builder.daemon(true);
            }
            Token::Flush(secs) => {
                builder.flush_interval_secs(secs);
            }
            Token::Verbose => {
                builder.verbose(true);
            }
            Token::Input(name) => {
                let plugin = registry
                    .create_instance(PluginKind::Input, &name)
                    .map_err(|source| CompileError::InvalidInput { name, source })?;
                let handle = builder.add_instance(plugin);
                return Ok(Cursor {
                    scope: Scope::Input,
                    last_input: Some(handle),
                    ..self
                });
            }
            Token::Output(name) => {
                let plugin = registry
                    .create_instance(PluginKind::Output, &name)
                    .map_err(|source| CompileError::InvalidOutput { name, source })?;
                let handle = builder.add_instance(plugin);
                return Ok(Cursor {
                    scope: Scope::Output,
                    last_output: Some(handle),
                    ..self
                });
            }
            Token::Tag(tag) => match self.last_input {
                Some(handle) => apply_property(builder, registry, handle, PROP_TAG, &tag)?,
                None => log::debug!("--tag {tag} ignored: no input defined yet"),
            },
            Token::Match(pattern) => match self.last_output {
                Some(handle) => apply_property(builder, registry, handle, PROP_MATCH, &pattern)?,
                None => log::debug!("--match {pattern} ignored: no output defined yet"),
            },
            Token::Prop(prop) => {
                let (key, value) = split_property(&prop)?;
                let target = match self.scope {
                    Scope::Input => self.last_input,
                    Scope::Output => self.last_output,
                    Scope::None => None,
                };
                match target {
                    Some(handle) => apply_property(builder, registry, handle, key, value)?,
                    None => log::warn!("--prop {prop} ignored: it must follow an --input or an --output"),
                }
            }
        }
        Ok(self)
    }
}

fn apply_property<R: PluginRegistry + ?Sized>(
    builder: &mut ConfigBuilder,
    registry: &R,
    handle: Handle,
    key: &str,
    value: &str,
) -> Result<(), CompileError> {
    let instance = builder.instance_mut(handle);
    registry
        .set_property(instance, key, value)
        .map_err(|source| CompileError::InvalidProperty {
            instance: instance.id.clone(),
            key: key.to_owned(),
            source,
        })
}

/// Splits `KEY=VALUE` on the first `=`.
pub fn split_property(prop: &str) -> Result<(&str, &str), CompileError> {
    prop.split_once('=')
        .ok_or_else(|| CompileError::MalformedProperty(prop.to_owned()))
}

/// Compiles the tokens, in order, into a pipeline configuration.
///
/// Every `--input` and `--output` creates an instance through the registry,
/// even if a later token fails.
pub fn compile<R, I>(tokens: I, registry: &R) -> Result<PipelineConfig, CompileError>
where
    R: PluginRegistry + ?Sized,
    I: IntoIterator<Item = Token>,
{
    let mut builder = ConfigBuilder::new();
    tokens
        .into_iter()
        .try_fold(Cursor::default(), |cursor, token| cursor.step(token, &mut builder, registry))?;
    Ok(builder.build())
}
