//! CLI front end: read a log file, split it into pipelines, print them.
//!
//! Usage:
//!   logdemux <input.log>
//!   logdemux <input.log> -o <output.txt>
//!
//! `-v` prints every non-fatal warning to stderr; `-s` turns any
//! malformed record or warning into a failure.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use logdemux_rs::{ErrorPolicy, RunOutcome, SemanticsParser, SplitByPipeline};
use tracing_subscriber::EnvFilter;

/// Reconstruct the logical pipelines interleaved in a log record stream.
#[derive(Parser)]
#[command(name = "logdemux", version, about)]
struct Cli {
    /// Input file with interleaved log records
    input: PathBuf,

    /// Write the reconstructed pipelines to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print every non-fatal warning collected during the run
    #[arg(short, long)]
    verbose: bool,

    /// Fail on the first malformed record or any warning
    #[arg(short, long)]
    strict: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "logdemux_rs=debug"
    } else {
        "logdemux_rs=error"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(message) = run(&cli) {
        eprintln!("logdemux: {message}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let input = fs::read_to_string(&cli.input)
        .map_err(|e| format!("error reading input file '{}': {e}", cli.input.display()))?;

    let policy = if cli.strict {
        ErrorPolicy::Abort
    } else {
        ErrorPolicy::SkipAndContinue
    };
    let splitter = SplitByPipeline::new(SemanticsParser::with_core_decoders(), policy);
    let outcome = splitter.run(&input).map_err(|e| e.to_string())?;

    if cli.verbose {
        for report in &outcome.reports {
            eprintln!("warning: {report}");
        }
    }
    if cli.strict && outcome.has_reports() {
        return Err("warnings found in strict mode".to_string());
    }
    if outcome.chains.is_empty() {
        return Err(format!(
            "no messages found in '{}'; run with -v to see what was skipped",
            cli.input.display()
        ));
    }

    let rendered = render(&outcome);
    match &cli.output {
        Some(path) => fs::write(path, rendered)
            .map_err(|e| format!("error writing output file '{}': {e}", path.display()))?,
        None => print!("{rendered}"),
    }
    Ok(())
}

fn render(outcome: &RunOutcome) -> String {
    let mut out = String::new();
    for (index, chain) in outcome.chains.iter().enumerate() {
        let _ = writeln!(out, "Pipeline {}", index + 1);
        for message in chain.messages() {
            let _ = writeln!(out, "    {}| {}", message.id, message.payload);
        }
        if let Some(awaited) = chain.awaiting() {
            let _ = writeln!(out, "    (incomplete: message {awaited} never arrived)");
        }
    }
    out
}
