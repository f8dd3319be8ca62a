//! qmcert - certification result checking from the command line
//!
//! Exposes the pure parts of the certification core to operators: result
//! comparison, error location correlation and per-file error collection.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qmcert_core::CertConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// qmcert - clinical quality measure certification tools
#[derive(Parser, Debug)]
#[command(name = "qmcert")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to certification configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare reported measure results against expected results
    Compare(commands::compare::CompareArgs),

    /// Resolve error locations to node identifiers in a document
    Correlate(commands::correlate::CorrelateArgs),

    /// Collect the errors of one submitted document by category
    Collect(commands::collect::CollectArgs),
}

fn load_config(path: Option<&PathBuf>) -> Result<CertConfig> {
    match path {
        Some(path) => CertConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(CertConfig::default()),
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let config = load_config(cli.config.as_ref())?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let code = match cli.command {
        Commands::Compare(args) => commands::compare::run(&args, &mut out)?,
        Commands::Correlate(args) => commands::correlate::run(&args, &config, &mut out)?,
        Commands::Collect(args) => commands::collect::run(&args, &config, &mut out)?,
    };
    out.flush()?;

    Ok(ExitCode::from(code))
}
