use anyhow::{anyhow, Context};
use assert_cmd::cargo::{CargoError, CommandCargoExt};
use std::{
    io::{Read, Write},
    ops::{Deref, DerefMut},
    path::Path,
    process::{Child, Command, Output, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// Name of the agent binary.
pub const BINARY: &str = "brook";

/// Constructs a `Command` that executes the agent.
///
/// This does NOT call `cargo run`, see [`assert_cmd::Command::cargo_bin`].
pub fn command_run_agent(bin_args: &[&str]) -> Result<Command, CargoError> {
    let mut cmd = Command::cargo_bin(BINARY)?;
    cmd.args(bin_args).env_remove("BROOK_CONFIG").env_remove("RUST_LOG");
    Ok(cmd)
}

/// Executes the agent with the given arguments in `workdir`, and
/// duplicates its output to the current stdout/stderr and two buffers.
///
/// The stdout and stderr are both redirected to a pipe, and copied to the current stdout and stderr,
/// and to two buffers. The buffers are returned in an [`Output`].
///
/// Use this for runs that stop by themselves.
pub fn run_agent_tee(bin_args: &[&str], workdir: &Path) -> anyhow::Result<Output> {
    let mut child = spawn_agent(bin_args, workdir)?;
    child.wait_with_tee(Duration::from_secs(30))
}

/// Starts the agent with piped outputs. The agent is killed when the guard is dropped.
pub fn spawn_agent(bin_args: &[&str], workdir: &Path) -> anyhow::Result<ChildGuard> {
    let mut cmd = command_run_agent(bin_args)?;
    let child = cmd
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("could not spawn process: {cmd:?}"))?;
    Ok(ChildGuard::new(child))
}

fn tee(mut stream: impl Read, a: &mut impl Write, b: &mut impl Write) -> std::io::Result<()> {
    let mut buf = [0u8; 256];
    loop {
        // read from input
        let n_read = stream.read(&mut buf)?;
        if n_read == 0 {
            break;
        }

        // write to all outputs
        let buf = &buf[..n_read];
        a.write_all(buf)?;
        b.write_all(buf)?;
    }
    Ok(())
}

fn tee_thread(stream: impl Read + Send + 'static, to_stderr: bool) -> JoinHandle<anyhow::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::with_capacity(512);
        if to_stderr {
            tee(stream, &mut buf, &mut std::io::stderr().lock())?;
        } else {
            tee(stream, &mut buf, &mut std::io::stdout().lock())?;
        }
        anyhow::Ok(buf)
    })
}

/// Sends a signal to the process.
pub fn send_signal(child: &Child, signal: libc::c_int) -> anyhow::Result<()> {
    let res = unsafe { libc::kill(child.id() as i32, signal) };
    if res == 0 {
        Ok(())
    } else {
        Err(anyhow!("failed to send signal {signal} to process {}", child.id()))
    }
}

/// A wrapper around a child process that kills the child on drop.
pub struct ChildGuard(Option<Child>);

impl ChildGuard {
    pub fn new(process: Child) -> Self {
        Self(Some(process))
    }

    /// Waits for the child to exit, while copying its outputs.
    ///
    /// If the child is still running after `timeout`, it is killed and an error is returned.
    pub fn wait_with_tee(&mut self, timeout: Duration) -> anyhow::Result<Output> {
        let stdout_thread = tee_thread(self.stdout.take().context("could not attach to child stdout")?, false);
        let stderr_thread = tee_thread(self.stderr.take().context("could not attach to child stderr")?, true);

        let start = Instant::now();
        let status = loop {
            if let Some(status) = self.try_wait()? {
                break status;
            }
            if start.elapsed() > timeout {
                let _ = self.kill();
                return Err(anyhow!("the agent did not stop within {timeout:?}"));
            }
            thread::sleep(Duration::from_millis(50));
        };

        let stdout = stdout_thread.join().unwrap()?;
        let stderr = stderr_thread.join().unwrap()?;
        Ok(Output { status, stdout, stderr })
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.0.take() {
            if let Ok(Some(_)) = child.try_wait() {
                return;
            }
            if let Err(e) = child.kill() {
                println!("ERROR: failed to kill child {} on drop: {e}", child.id());
            }
        }
    }
}

impl Deref for ChildGuard {
    type Target = Child;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref().unwrap()
    }
}

impl DerefMut for ChildGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut().unwrap()
    }
}
