//! Brook: a small, pluggable log pipeline.
//!
//! Brook collects records from _inputs_, buffers them, and periodically flushes them to _outputs_.
//! The inputs and outputs are provided by plugins, which are registered at compile time.
//!
//! # This crate
//! This crate provides the core of Brook:
//! 1. The [plugin registry](plugin::registry), which creates plugin instances by name.
//! 2. The [option compiler](agent::compile), which turns the command-line tokens into a [`PipelineConfig`](config::PipelineConfig).
//! 3. The [validator](agent::validate), which checks the configuration before anything starts.
//! 4. The [engine], which runs the pipeline on Tokio tasks.
//! 5. The [shutdown coordinator](agent::shutdown), which stops the engine on termination signals.
//!
//! # Agents and plugins
//! To do something useful with Brook, you need:
//! - A runnable application, the _agent_. See the `brook-agent` crate.
//! - A set of _plugins_. Learn how to make plugins by reading the documentation of the [`plugin`] module.

pub mod agent;
pub mod config;
pub mod engine;
pub mod plugin;
