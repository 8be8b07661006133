use std::convert::Infallible;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::Context;
use brook::agent::startup::{DaemonOutcome, Daemonizer};
use brook::config::PluginKind;
use brook::plugin::registry::PluginRegistry;
use env_logger::Env;

/// Set in the environment of the background process.
pub const DAEMONIZED_ENV: &str = "BROOK_DAEMONIZED";

/// Returns the absolute path of the currently running executable.
pub fn absolute_exe_path() -> std::io::Result<PathBuf> {
    std::env::current_exe()?.canonicalize()
}

/// Initializes the global logger.
///
/// Call this first! The default level is `info`, or `debug` if `verbose` is true.
/// In both cases, `RUST_LOG` takes precedence.
///
/// # Example
///
/// ```
/// use brook_agent::init_logger;
///
/// fn main() {
///     init_logger(false);
///     log::info!("I can log now!");
/// }
/// ```
pub fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    // Print a warning if we are running in debug mode.
    #[cfg(debug_assertions)]
    {
        log::warn!("DEBUG assertions are enabled, this build of Brook is fine for debugging, but not for production.");
    }
}

/// Generates a version number from the information generated in the build script.
/// See `build.rs` at the crate root.
pub fn agent_version() -> String {
    const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");
    if option_env!("BROOK_AGENT_RELEASE").is_some() {
        const BUILD_DATE: &str = env!("VERGEN_BUILD_DATE");
        format!("{CRATE_VERSION} ({BUILD_DATE})")
    } else {
        const BUILD_TIMESTAMP: &str = env!("VERGEN_BUILD_TIMESTAMP");
        const RUSTC_SEMVER: &str = env!("VERGEN_RUSTC_SEMVER");
        const CARGO_DEBUG: &str = env!("VERGEN_CARGO_DEBUG");
        format!("{CRATE_VERSION} ({BUILD_TIMESTAMP}, rustc {RUSTC_SEMVER}, debug={CARGO_DEBUG})")
    }
}

/// Converts the value of `--flush` to a number of seconds, like C's `atoi`.
///
/// Leading whitespace and an optional sign are accepted, then the leading digits are converted
/// and the rest is ignored. Without digits, the result is 0. The value is checked later, by the
/// validation of the configuration, therefore this function never fails.
pub fn parse_flush_secs(value: &str) -> Result<i64, Infallible> {
    let s = value.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let n = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |n, d| n.saturating_mul(10).saturating_add(i64::from(d - b'0')));
    Ok(if negative { -n } else { n })
}

/// Lists the inputs and outputs of the registry, for the help message.
///
/// Hidden plugins are not listed.
pub fn plugins_help(registry: &dyn PluginRegistry) -> String {
    let mut help = String::new();
    for (title, kind) in [("Inputs", PluginKind::Input), ("Outputs", PluginKind::Output)] {
        let plugins = registry.list_registered(kind);
        let width = plugins.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        help.push_str(title);
        help.push('\n');
        for (name, description) in plugins {
            help.push_str(&format!("  {name:width$}  {description}\n"));
        }
        help.push('\n');
    }
    help.truncate(help.trim_end().len());
    help
}

/// Runs the agent in the background by executing it again, detached from the terminal.
///
/// The new process has the same arguments, and [`DAEMONIZED_ENV`] in its environment.
pub struct ReExec;

impl Daemonizer for ReExec {
    fn daemonize(&self) -> anyhow::Result<DaemonOutcome> {
        if std::env::var_os(DAEMONIZED_ENV).is_some() {
            return Ok(DaemonOutcome::Child);
        }
        #[cfg(unix)]
        use std::os::unix::process::CommandExt;

        let exe = absolute_exe_path().context("could not find the current executable")?;
        let mut cmd = Command::new(&exe);
        cmd.args(std::env::args_os().skip(1))
            .env(DAEMONIZED_ENV, "1")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // new process group, so that the signals sent to the terminal do not reach the child
        #[cfg(unix)]
        cmd.process_group(0);
        let child = cmd
            .spawn()
            .with_context(|| format!("could not spawn {}", exe.display()))?;
        Ok(DaemonOutcome::Parent { child_pid: child.id() })
    }
}

#[cfg(test)]
mod tests {
    use brook::plugin::registry::StaticRegistry;

    use super::{parse_flush_secs, plugins_help};

    #[test]
    fn help_hides_the_lib_input() {
        let registry = StaticRegistry::new(Vec::new());
        let help = plugins_help(&registry);
        assert_eq!(help, "Inputs\n\nOutputs");
        assert!(!help.contains("lib"));
    }

    #[test]
    fn flush_secs_like_atoi() {
        let cases = [
            ("5", 5),
            ("+12", 12),
            ("-5", -5),
            ("  7", 7),
            ("10s", 10),
            ("abc", 0),
            ("", 0),
            ("-", 0),
            ("1.5", 1),
        ];
        for (value, expected) in cases {
            assert_eq!(parse_flush_secs(value), Ok(expected), "value: {value:?}");
        }
        assert_eq!(parse_flush_secs("99999999999999999999999"), Ok(i64::MAX));
    }
}
