use anyhow::Result;
use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};

use crate::app_config::{FileConfig, VerbositySetting};
use crate::cli::Args;

/// Which arguments were given explicitly on the command line.
///
/// Explicit values beat the config file; clap defaults do not.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) output_dir: bool,
    pub(crate) name_filter: bool,
    pub(crate) columns: bool,
    pub(crate) max_columns: bool,
    pub(crate) concurrency: bool,
    pub(crate) max_attempts: bool,
    pub(crate) disambiguate: bool,
    pub(crate) connect_timeout: bool,
    pub(crate) read_timeout: bool,
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
}

pub(crate) fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let command = Args::command();
    let matches = command.get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = sources_from_matches(&matches);
    (args, sources)
}

fn sources_from_matches(matches: &ArgMatches) -> CliValueSources {
    CliValueSources {
        output_dir: is_commandline_value(matches, "output_dir"),
        name_filter: is_commandline_value(matches, "name_filter"),
        columns: is_commandline_value(matches, "columns"),
        max_columns: is_commandline_value(matches, "max_columns"),
        concurrency: is_commandline_value(matches, "concurrency"),
        max_attempts: is_commandline_value(matches, "max_attempts"),
        disambiguate: is_commandline_value(matches, "disambiguate"),
        connect_timeout: is_commandline_value(matches, "connect_timeout"),
        read_timeout: is_commandline_value(matches, "read_timeout"),
        verbose: is_commandline_value(matches, "verbose"),
        quiet: is_commandline_value(matches, "quiet"),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Fills every argument not given on the command line from the config file.
pub(crate) fn apply_config_defaults(
    mut args: Args,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> Result<Args> {
    let Some(file_config) = file_config else {
        return Ok(args);
    };

    if !cli_sources.output_dir
        && let Some(output_dir) = &file_config.output_dir
    {
        args.output_dir = Some(output_dir.clone());
    }

    if !cli_sources.name_filter
        && let Some(name_filter) = &file_config.name_filter
    {
        args.name_filter = Some(name_filter.clone());
    }

    if !cli_sources.columns
        && let Some(columns) = &file_config.columns
    {
        args.columns.clone_from(columns);
    }

    if !cli_sources.max_columns
        && let Some(max_columns) = file_config.max_columns
    {
        args.max_columns = max_columns;
    }

    if !cli_sources.concurrency
        && let Some(concurrency) = file_config.concurrency
    {
        args.concurrency = concurrency;
    }

    if !cli_sources.max_attempts
        && let Some(max_attempts) = file_config.max_attempts
    {
        args.max_attempts = max_attempts;
    }

    if !cli_sources.disambiguate
        && let Some(disambiguate) = file_config.disambiguate
    {
        args.disambiguate = disambiguate;
    }

    if !cli_sources.connect_timeout
        && let Some(secs) = file_config.connect_timeout_secs
    {
        args.connect_timeout = secs;
    }

    if !cli_sources.read_timeout
        && let Some(secs) = file_config.read_timeout_secs
    {
        args.read_timeout = secs;
    }

    if !cli_sources.verbose
        && !cli_sources.quiet
        && let Some(verbosity) = file_config.verbosity
    {
        apply_config_verbosity(&mut args, verbosity);
    }

    Ok(args)
}

fn apply_config_verbosity(args: &mut Args, verbosity: VerbositySetting) {
    let (quiet, verbose) = match verbosity {
        VerbositySetting::Default => (false, 0),
        VerbositySetting::Verbose => (false, 1),
        VerbositySetting::Quiet => (true, 0),
        VerbositySetting::Debug => (false, 2),
    };
    args.quiet = quiet;
    args.verbose = verbose;
}

pub(crate) fn resolve_default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

pub(crate) fn should_force_cli_log_level(cli_sources: &CliValueSources) -> bool {
    cli_sources.verbose || cli_sources.quiet
}
