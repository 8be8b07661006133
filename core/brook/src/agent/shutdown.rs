//! Stops the engine when the process receives a termination signal.
//!
//! The OS-level handlers, installed by Tokio, only record the signal.
//! A supervisor task, running on the engine runtime, waits for the first signal and then:
//! 1. writes a fixed message to stderr;
//! 2. asks the engine to shut down, exactly once;
//! 3. waits for a grace period, and ends the process if the engine is still draining.
//!
//! If the engine stops before the end of the grace period, the runtime is shut down with the
//! supervisor, and the agent returns normally.
//!
//! Interrupt, quit, hangup and terminate are handled the same way. The signals that arrive
//! before the installation, or after the first one, have no effect on the coordinator.

use std::future::Future;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

use crate::engine::EngineHandle;

/// Written to stderr when the first termination signal is received.
pub const SIGNAL_MESSAGE: &[u8] = b"[engine] caught signal\n";

/// Signals that end the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Quit,
    Hangup,
    Terminate,
}

/// Something that can be asked to shut down.
pub trait ShutdownTarget: Send + Sync + 'static {
    fn request_shutdown(&self);
}

impl ShutdownTarget for EngineHandle {
    fn request_shutdown(&self) {
        self.shutdown();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Armed,
    ShuttingDown,
}

/// State shared between the coordinator and its supervisor task.
#[derive(Debug, Default)]
pub struct SharedState {
    shutting_down: AtomicBool,
}

impl SharedState {
    pub fn get(&self) -> CoordinatorState {
        if self.shutting_down.load(Ordering::Acquire) {
            CoordinatorState::ShuttingDown
        } else {
            CoordinatorState::Armed
        }
    }

    /// Goes from `Armed` to `ShuttingDown`.
    /// Returns `false` if the shutdown had already begun.
    fn begin_shutdown(&self) -> bool {
        self.shutting_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

pub struct ShutdownCoordinator {
    state: Arc<SharedState>,
    supervisor: JoinHandle<()>,
}

impl ShutdownCoordinator {
    /// Installs the signal handlers and spawns the supervisor task on the given runtime.
    ///
    /// `grace` is how long the engine is given to drain before the process is ended.
    pub fn install<T: ShutdownTarget>(rt: &runtime::Handle, target: T, grace: Duration) -> io::Result<Self> {
        // The signal streams must be created in the context of the runtime.
        let _guard = rt.enter();
        let signals = wait_for_signal()?;
        let state = Arc::new(SharedState::default());
        let supervisor = rt.spawn(supervise(signals, target, state.clone(), grace, exit_process));
        log::debug!("Shutdown coordinator installed.");
        Ok(Self { state, supervisor })
    }

    pub fn state(&self) -> CoordinatorState {
        self.state.get()
    }

    /// Stops the supervisor. The signal handlers stay installed but have no effect anymore.
    pub fn disarm(self) {
        self.supervisor.abort();
    }
}

/// Registers the handlers now, and returns a future that completes on the first signal.
fn wait_for_signal() -> io::Result<impl Future<Output = TerminationSignal> + Send + 'static> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => TerminationSignal::Interrupt,
            _ = quit.recv() => TerminationSignal::Quit,
            _ = hangup.recv() => TerminationSignal::Hangup,
            _ = terminate.recv() => TerminationSignal::Terminate,
        }
    })
}

fn exit_process(code: i32) {
    std::process::exit(code)
}

/// Waits for `signal`, then requests the shutdown of `target` and calls `exit` after `grace`.
///
/// Does nothing if `state` is already `ShuttingDown`.
pub async fn supervise<F, T, E>(signal: F, target: T, state: Arc<SharedState>, grace: Duration, exit: E)
where
    F: Future<Output = TerminationSignal>,
    T: ShutdownTarget,
    E: FnOnce(i32),
{
    let received = signal.await;
    if !state.begin_shutdown() {
        return;
    }
    // stderr is unbuffered, the message is written in one call
    let _ = io::stderr().write_all(SIGNAL_MESSAGE);
    log::debug!("{received:?} received, shutting down the engine");
    target.request_shutdown();

    tokio::time::sleep(grace).await;
    log::warn!("The engine did not stop within {grace:?}, exiting now.");
    exit(0);
}
