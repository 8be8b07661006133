use anyhow::Context;
use brook::{
    agent::{
        compile::{compile, Token},
        startup::launch,
        validate::validate,
    },
    plugin::{registry::StaticRegistry, PluginMetadata},
    static_plugins,
};
use brook_agent::{agent_version, init_logger, plugins_help, ReExec};
use clap::{ArgMatches, Args, FromArgMatches};

const BINARY: &str = env!("CARGO_BIN_NAME");

/// Loads the available plugins.
fn load_plugins_metadata() -> Vec<PluginMetadata> {
    static_plugins! {
        inputs: [plugin_dummy::DummyInput, plugin_stdin::StdinInput],
        outputs: [plugin_stdout::StdoutOutput, plugin_null::NullOutput],
    }
}

/// Main agent function.
///
/// The steps are:
/// - register the available plugins
/// - parse the CLI, `--help` and `--version` stop here
/// - compile the flags, in order, into a pipeline configuration
/// - validate the configuration
/// - start the engine and wait until it stops
///
/// About errors: we use `anyhow::Result` and `context` instead of `expect` to get
/// nicer error messages (`expect` prints errors with `Debug`).
/// Every error ends the process with the exit code 1.
fn main() -> anyhow::Result<()> {
    let registry = StaticRegistry::new(load_plugins_metadata());

    // Define the command-line interface.
    let mut cmd = clap::Command::new(BINARY)
        .version(agent_version())
        .after_help(plugins_help(&registry))
        .disable_version_flag(true);
    cmd = cli::Cli::augment_args(cmd).arg(cli::version_arg());

    // Parse CLI arguments and handle the special flags --version and --help.
    let matches = match cmd.try_get_matches() {
        Ok(matches) => matches,
        Err(e) if e.use_stderr() => {
            // Usage errors are reported like the other failures, with the exit code 1.
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };
    let args = cli::Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_logger(args.verbose);

    let tokens = cli_tokens(&args, &matches);
    log::debug!(
        "command-line flags: {}",
        tokens.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
    );
    let config = compile(tokens, &registry).context("invalid command-line arguments")?;
    validate(&config).context("invalid configuration")?;
    launch(config, &registry, &agent_version(), &ReExec)
}

/// Turns the parsed arguments into compiler tokens.
///
/// The position of `--prop`, `--tag` and `--match` matters, therefore these flags are
/// sorted by their index on the command line, with `--input` and `--output`.
/// The other flags are global.
fn cli_tokens(args: &cli::Cli, matches: &ArgMatches) -> Vec<Token> {
    let mut tokens = Vec::new();
    if let Some(path) = &args.config {
        tokens.push(Token::Config(path.clone()));
    }
    if let Some(secs) = args.flush {
        tokens.push(Token::Flush(secs));
    }
    if args.daemon {
        tokens.push(Token::Daemon);
    }
    if args.verbose {
        tokens.push(Token::Verbose);
    }

    let mut positional: Vec<(usize, Token)> = Vec::new();
    let ordered_args: [(&str, &Vec<String>, fn(String) -> Token); 5] = [
        (cli::ARG_INPUT, &args.input, Token::Input),
        (cli::ARG_OUTPUT, &args.output, Token::Output),
        (cli::ARG_PROP, &args.prop, Token::Prop),
        (cli::ARG_TAG, &args.tag, Token::Tag),
        (cli::ARG_MATCH, &args.match_pattern, Token::Match),
    ];
    for (id, values, make_token) in ordered_args {
        if let Some(indices) = matches.indices_of(id) {
            positional.extend(indices.zip(values.iter().cloned().map(make_token)));
        }
    }
    positional.sort_by_key(|(index, _)| *index);
    tokens.extend(positional.into_iter().map(|(_, token)| token));
    tokens
}

/// Agent command-line interface (CLI).
///
/// We use `clap` to parse these options, therefore the structs
/// derive [`clap::Args`] or other clap trait implementations.
///
/// To recover the order of the flags, we combine the "derive" and "builder" APIs of clap.
/// See https://docs.rs/clap/latest/clap/_derive/index.html#mixing-builder-and-derive-apis
mod cli {
    use std::path::PathBuf;

    use clap::{Arg, ArgAction, Parser};

    pub const ARG_INPUT: &str = "input";
    pub const ARG_OUTPUT: &str = "output";
    pub const ARG_PROP: &str = "prop";
    pub const ARG_TAG: &str = "tag";
    pub const ARG_MATCH: &str = "match";

    // NOTE: the doc comment attached to `Cli` is used by clap as the description of
    // the application. It is displayed at the start of the help message.

    /// Brook agent: collect records from inputs and flush them to outputs.
    ///
    /// The flags --prop, --tag and --match apply to the last --input or --output.
    #[derive(Parser)]
    #[command(disable_version_flag = true)]
    pub struct Cli {
        /// Path to the configuration file (engine settings).
        #[arg(short, long, env = "BROOK_CONFIG", value_name = "PATH", overrides_with = "config")]
        pub config: Option<PathBuf>,

        /// Run in the background.
        #[arg(short, long, overrides_with = "daemon")]
        pub daemon: bool,

        /// Flush the buffered records every N seconds [default: 5].
        #[arg(
            short,
            long,
            value_name = "N",
            value_parser = brook_agent::parse_flush_secs,
            allow_negative_numbers = true,
            overrides_with = "flush"
        )]
        pub flush: Option<i64>,

        /// Add an input plugin instance.
        #[arg(short, long, value_name = "NAME")]
        pub input: Vec<String>,

        /// Select the records of the last output by tag, ex. `app.*`.
        #[arg(id = ARG_MATCH, short, long = "match", value_name = "PATTERN")]
        pub match_pattern: Vec<String>,

        /// Add an output plugin instance.
        #[arg(short, long, value_name = "NAME")]
        pub output: Vec<String>,

        /// Set a property of the last input or output.
        #[arg(short, long, value_name = "KEY=VALUE")]
        pub prop: Vec<String>,

        /// Set the tag of the records of the last input.
        #[arg(short, long, value_name = "VALUE")]
        pub tag: Vec<String>,

        /// Enable verbose mode: print the setup and the debug logs.
        #[arg(short = 'V', long, overrides_with = "verbose")]
        pub verbose: bool,
    }

    /// Replaces the default version flag, so that `-v` prints the version and `-V` is `--verbose`.
    pub fn version_arg() -> Arg {
        Arg::new("version")
            .short('v')
            .long("version")
            .action(ArgAction::Version)
            .help("Print version")
    }
}
