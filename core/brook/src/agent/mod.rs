//! Everything the agent does between the command line and the running engine.
//!
//! ```text
//! tokens --compile--> PipelineConfig --validate--> launch --> engine
//!                                                    |
//!                                  shutdown coordinator (on signal)
//! ```
//!
//! The configuration is moved from one step to the next, there is no global state.

pub mod compile;
pub mod shutdown;
pub mod startup;
pub mod validate;
