use clap::{Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;

use crate::aggregate::AggregateStrategy;
use crate::config::{Config, MalformedPolicy};
use crate::report::{OutputFormat, ReportOptions};

pub struct CliArgs {
    /// File to read integers from, or `-` for stdin.
    pub source: String,
    pub config: Config,
    pub report: ReportOptions,
    pub verbose: bool,
}

pub fn command() -> Command {
    Command::new("primeflow")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Classify integers as prime or non-prime on a pool of worker threads")
        .arg(
            Arg::new("file")
                .help("Whitespace-separated integers to process ('-' for stdin)")
                .default_value("input.txt")
                .index(1),
        )
        .arg(
            Arg::new("threads")
                .help("Number of worker threads (default: available cores)")
                .long("threads")
                .short('t')
                .value_parser(clap::value_parser!(u16).range(1..)),
        )
        .arg(
            Arg::new("strategy")
                .help("How workers synchronize the shared totals")
                .long_help(
                    "atomic - every counter is an independent atomic\n\
                     locked - one mutex guards all counters",
                )
                .long("strategy")
                .short('s')
                .value_parser(["atomic", "locked"])
                .default_value("atomic"),
        )
        .arg(
            Arg::new("capacity")
                .help("Bound the queue to N items; the reader blocks while it is full")
                .long("capacity")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("strict")
                .help("Stop reading at the first malformed entry instead of skipping it")
                .long("strict")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max_size_mb")
                .help("Maximum input file size in MB")
                .long("max-size-mb")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("no_exec_times")
                .help("Do not print execution times")
                .long("no-exec-times")
                .action(ArgAction::SetTrue)
                .conflicts_with("only_exec_times"),
        )
        .arg(
            Arg::new("only_exec_times")
                .help("Print only the execution time")
                .long("only-exec-times")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .help("Output results in JSON format")
                .long("json")
                .action(ArgAction::SetTrue)
                .conflicts_with("csv"),
        )
        .arg(
            Arg::new("csv")
                .help("Output results in CSV format")
                .long("csv")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .help("Log progress and print per-worker statistics")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue),
        )
}

pub fn parse_cli_args() -> CliArgs {
    from_matches(&command().get_matches())
}

pub fn parse_cli_args_from<I, T>(args: I) -> Result<CliArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command().try_get_matches_from(args)?;
    Ok(from_matches(&matches))
}

fn from_matches(matches: &ArgMatches) -> CliArgs {
    let source = matches
        .get_one::<String>("file")
        .cloned()
        .unwrap_or_else(|| "input.txt".to_string());

    let strategy: AggregateStrategy = matches
        .get_one::<String>("strategy")
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();

    let mut config = Config::new().with_strategy(strategy);
    if let Some(threads) = matches.get_one::<u16>("threads") {
        config = config.with_workers(*threads as usize);
    }
    if let Some(capacity) = matches.get_one::<usize>("capacity") {
        config = config.with_queue_capacity(*capacity);
    }
    if let Some(max_size_mb) = matches.get_one::<u64>("max_size_mb") {
        config = config.with_max_source_size_mb(*max_size_mb);
    }
    if matches.get_flag("strict") {
        config = config.with_malformed_policy(MalformedPolicy::Stop);
    }

    let format = if matches.get_flag("json") {
        OutputFormat::Json
    } else if matches.get_flag("csv") {
        OutputFormat::Csv
    } else {
        OutputFormat::Human
    };
    let verbose = matches.get_flag("verbose");

    let report = ReportOptions {
        format,
        show_times: !matches.get_flag("no_exec_times"),
        only_times: matches.get_flag("only_exec_times"),
        show_workers: verbose,
    };

    CliArgs {
        source,
        config,
        report,
        verbose,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = parse_cli_args_from(["primeflow"]).unwrap();
        assert_eq!(args.source, "input.txt");
        assert_eq!(args.config.num_workers, 0);
        assert_eq!(args.config.strategy, AggregateStrategy::Atomic);
        assert_eq!(args.config.queue_capacity, None);
        assert_eq!(args.report, ReportOptions::default());
        assert!(!args.verbose);
    }

    #[test]
    fn test_full_argument_set() {
        let args = parse_cli_args_from([
            "primeflow",
            "numbers.txt",
            "-t",
            "8",
            "--strategy",
            "locked",
            "--capacity",
            "64",
            "--strict",
            "--no-exec-times",
            "--csv",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.source, "numbers.txt");
        assert_eq!(args.config.workers(), 8);
        assert_eq!(args.config.strategy, AggregateStrategy::Locked);
        assert_eq!(args.config.queue_capacity, Some(64));
        assert_eq!(args.config.malformed, MalformedPolicy::Stop);
        assert_eq!(args.report.format, OutputFormat::Csv);
        assert!(!args.report.show_times);
        assert!(args.report.show_workers);
    }

    #[test]
    fn test_rejects_zero_threads() {
        assert!(parse_cli_args_from(["primeflow", "-t", "0"]).is_err());
    }

    #[test]
    fn test_rejects_conflicting_time_flags() {
        assert!(
            parse_cli_args_from(["primeflow", "--no-exec-times", "--only-exec-times"]).is_err()
        );
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        assert!(parse_cli_args_from(["primeflow", "-s", "spin"]).is_err());
    }
}
