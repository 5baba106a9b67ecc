use anyhow::{Result, bail};
use clap::{Arg, ArgAction, Command};
use primeflow::bench::{BenchConfig, load_items, print_results, run_matrix, synthetic_items};
use primeflow::{AggregateStrategy, OutputFormat, available_workers};
use std::path::PathBuf;

fn parse_thread_list(list: &str) -> Result<Vec<usize>> {
    let mut counts = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let n: usize = part.parse()?;
        if n == 0 {
            bail!("thread count must be at least 1");
        }
        counts.push(n);
    }
    if counts.is_empty() {
        bail!("empty thread list");
    }
    Ok(counts)
}

fn main() -> Result<()> {
    let matches = Command::new("primeflow-bench")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compare the atomic and locked aggregation strategies across thread counts")
        .arg(
            Arg::new("file")
                .help("Input file of integers; synthetic data is used when omitted")
                .index(1),
        )
        .arg(
            Arg::new("count")
                .help("Number of synthetic items")
                .long("count")
                .short('n')
                .value_parser(clap::value_parser!(usize))
                .default_value("1000000"),
        )
        .arg(
            Arg::new("threads")
                .help("Comma-separated thread counts, e.g. 1,2,4,8")
                .long("threads")
                .short('t'),
        )
        .arg(
            Arg::new("strategy")
                .help("Only run one strategy")
                .long("strategy")
                .short('s')
                .value_parser(["atomic", "locked"]),
        )
        .arg(
            Arg::new("capacity")
                .help("Bound the queue to N items")
                .long("capacity")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("iterations")
                .help("Run each case N times")
                .long("iterations")
                .short('i')
                .value_parser(clap::value_parser!(usize))
                .default_value("1"),
        )
        .arg(
            Arg::new("warmup")
                .help("Run N warmup iterations before measurement")
                .long("warmup")
                .short('w')
                .value_parser(clap::value_parser!(usize))
                .default_value("0"),
        )
        .arg(
            Arg::new("json")
                .help("Output results in JSON format")
                .long("json")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("csv")
                .help("Output results in CSV format")
                .long("csv")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = BenchConfig {
        iterations: *matches.get_one::<usize>("iterations").unwrap_or(&1),
        warmup_iterations: *matches.get_one::<usize>("warmup").unwrap_or(&0),
        queue_capacity: matches.get_one::<usize>("capacity").copied(),
        ..BenchConfig::default()
    };
    if let Some(list) = matches.get_one::<String>("threads") {
        config.thread_counts = parse_thread_list(list)?;
    }
    if let Some(strategy) = matches.get_one::<String>("strategy") {
        config.strategies = vec![strategy.parse::<AggregateStrategy>()?];
    }
    config.output_format = if matches.get_flag("json") {
        OutputFormat::Json
    } else if matches.get_flag("csv") {
        OutputFormat::Csv
    } else {
        OutputFormat::Human
    };

    let items = match matches.get_one::<String>("file").map(PathBuf::from) {
        Some(path) => {
            let (items, malformed) = load_items(&path, u64::MAX)?;
            if malformed > 0 {
                eprintln!("Skipped {} malformed entries in {}", malformed, path.display());
            }
            items
        }
        None => {
            let count = *matches.get_one::<usize>("count").unwrap_or(&1_000_000);
            synthetic_items(count, 10_000_000, 0x5eed)
        }
    };

    eprintln!(
        "=== Configuration ===\n  Items: {}\n  Cores: {}\n  Threads: {:?}\n",
        items.len(),
        available_workers(),
        config.thread_counts
    );

    let results = run_matrix(&items, &config)?;
    let stdout = std::io::stdout();
    print_results(&mut stdout.lock(), &results, &config)?;
    Ok(())
}
