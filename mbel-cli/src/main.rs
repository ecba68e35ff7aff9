use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::CompileOptions;

/// Tooling for MBEL localization files.
#[derive(Parser, Debug)]
#[command(name = "mbel", version, about, long_about = None)]
struct Cli {
    /// Log more (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Worker threads for lint and compile; one per core by default
    #[arg(short = 'j', long, global = true, value_name = "N")]
    jobs: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check files for syntax errors and annotation violations
    Lint {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Compile files into one JSON table
    Compile {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Write JSON here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        #[arg(long, help = "Emit JSON without indentation")]
        compact: bool,
        #[arg(long, help = "Do not prefix keys with their directory namespace")]
        no_namespace: bool,
        /// Also write a key → file:line map
        #[arg(long, value_name = "FILE")]
        source_map: Option<PathBuf>,
    },
    /// Rewrite files in canonical form
    Fmt {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, help = "Only list files that would change; fail if any")]
        check: bool,
    },
    /// Count keys, blocks and annotations
    Stats {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List keys missing from or extra in the second path
    Diff { left: PathBuf, right: PathBuf },
    /// Convert a flat JSON string map into MBEL source
    Import {
        input: PathBuf,
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Recompile a directory whenever its files change
    Watch {
        dir: PathBuf,
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        /// Poll period in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Some(jobs) = cli.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("failed to configure worker threads")?;
    }
    execute(cli.command)
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn execute(command: Command) -> Result<()> {
    match command {
        Command::Lint { paths } => commands::lint(&paths),
        Command::Compile {
            paths,
            output,
            compact,
            no_namespace,
            source_map,
        } => commands::compile(
            &paths,
            &CompileOptions {
                output,
                compact,
                no_namespace,
                source_map,
            },
        ),
        Command::Fmt { paths, check } => commands::fmt(&paths, check),
        Command::Stats { paths } => commands::stats(&paths),
        Command::Diff { left, right } => commands::diff(&left, &right),
        Command::Import {
            input,
            output,
            namespace,
        } => commands::import(&input, output.as_deref(), namespace.as_deref()),
        Command::Watch {
            dir,
            output,
            interval,
        } => commands::watch(&dir, &output, Duration::from_millis(interval)),
    }
}
