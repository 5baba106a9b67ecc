use anyhow::{Context, Result};
use primeflow::cli::parse_cli_args;
use primeflow::{Pipeline, open_source, write_consistency_error, write_report};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = parse_cli_args();
    init_tracing(args.verbose);

    let source = open_source(&args.source, &args.config)
        .with_context(|| format!("failed to open '{}'", args.source))?;

    let pipeline = Pipeline::new(args.config);
    let report = pipeline.run(source)?;

    if let Some(err) = &report.source_error {
        eprintln!("Warning: input ended early: {}", err);
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let inconsistent = write_consistency_error(&mut out, &report)?;
    write_report(&mut out, &report, &args.report)?;
    out.flush()?;

    if inconsistent {
        std::process::exit(1);
    }
    Ok(())
}
