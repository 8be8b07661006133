//! Startup sequence of the agent, once the configuration is valid.

use std::time::Duration;

use anyhow::Context;

use super::shutdown::ShutdownCoordinator;
use crate::config::PipelineConfig;
use crate::engine;
use crate::plugin::registry::StaticRegistry;

/// Result of a daemonization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonOutcome {
    /// We are the original process: the pipeline runs in the child, we should stop.
    Parent { child_pid: u32 },
    /// We are the background process: go on.
    Child,
}

/// Moves the agent to the background.
pub trait Daemonizer {
    fn daemonize(&self) -> anyhow::Result<DaemonOutcome>;
}

/// Returns the banner that is printed at startup.
pub fn banner(version: &str) -> String {
    format!("Brook v{version}\n* A small, pluggable log pipeline\n")
}

/// Runs the startup sequence, then blocks until the engine stops.
///
/// The steps are:
/// - print the banner, and the resolved setup if `verbose` is enabled
/// - if `daemon` is enabled, move to the background (the original process stops here)
/// - start the engine, exactly once
/// - install the shutdown coordinator
/// - wait for the engine to stop
pub fn launch(
    config: PipelineConfig,
    registry: &StaticRegistry,
    version: &str,
    daemonizer: &dyn Daemonizer,
) -> anyhow::Result<()> {
    print!("{}", banner(version));
    if config.verbose {
        print!("{}", config.setup_summary());
    }

    if config.daemon {
        match daemonizer.daemonize().context("could not run in the background")? {
            DaemonOutcome::Parent { child_pid } => {
                println!("Brook is running in the background, pid {child_pid}");
                return Ok(());
            }
            DaemonOutcome::Child => log::debug!("Running in the background."),
        }
    }

    let engine = engine::start(config, registry).context("startup failure")?;
    let grace = engine.settings().shutdown_timeout;
    let coordinator = ShutdownCoordinator::install(engine.runtime_handle(), engine.control_handle(), grace)
        .context("could not install the signal handlers")?;

    engine
        .wait_for_shutdown(Duration::MAX)
        .context("error while running")?;
    coordinator.disarm();
    log::info!("Brook has stopped.");
    Ok(())
}
