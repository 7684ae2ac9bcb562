use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use readstore_core::DuplicateMode;
use std::path::PathBuf;

mod commands;
mod config;
mod error;
mod input;

use config::Config;
use error::CliError;

#[derive(Parser)]
#[command(name = "readstore")]
#[command(about = "ReadStore - per-chromosome read storage and probe quantitation")]
#[command(version)]
#[command(long_about = "
ReadStore buffers mapped reads per chromosome, sorts and deduplicates them into
compressed cache files, and answers probe overlap queries for quantitation.
Paired (HiC) data is stored under both ends of every interaction.

Examples:
  readstore import --genome genome.tsv --reads sample1.tsv --reads sample2.tsv
  readstore quantify --genome genome.tsv --probes probes.tsv --reads a.tsv --reads b.tsv --replicate-set treated
  readstore hic-import --genome genome.tsv --pairs pairs.tsv --min-distance 1000 --export pairs.out.tsv
  readstore config --example
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for cache files (overrides the configuration)
    #[arg(long, global = true)]
    pub temp_dir: Option<PathBuf>,

    /// Chromosomes finalised concurrently, at most 6
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import single-end reads into data sets and report their statistics
    Import {
        /// Genome file (name and length per line)
        #[arg(long, required = true)]
        genome: PathBuf,

        /// Read files, one data set each
        #[arg(long = "reads", required = true)]
        reads: Vec<PathBuf>,

        /// Duplicate removal: none, start-and-end, start or end
        #[arg(long)]
        dedup: Option<DuplicateMode>,

        /// Input is already sorted by position
        #[arg(long)]
        presorted: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Count reads over probes for each data set
    Quantify {
        /// Genome file (name and length per line)
        #[arg(long, required = true)]
        genome: PathBuf,

        /// Probe file (chromosome, start, end and optional name)
        #[arg(long, required = true)]
        probes: PathBuf,

        /// Read files, one data set each
        #[arg(long = "reads", required = true)]
        reads: Vec<PathBuf>,

        /// Duplicate removal: none, start-and-end, start or end
        #[arg(long)]
        dedup: Option<DuplicateMode>,

        /// Also report the data sets pooled as a group with this name
        #[arg(long)]
        group: Option<String>,

        /// Also report mean and spread across data sets as a replicate set
        #[arg(long)]
        replicate_set: Option<String>,

        /// Output file (tab separated, stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import paired (HiC) reads and report cis/trans statistics
    HicImport {
        /// Genome file (name and length per line)
        #[arg(long, required = true)]
        genome: PathBuf,

        /// Pair file (two reads per line)
        #[arg(long, required = true)]
        pairs: PathBuf,

        /// Discard cis pairs closer than this
        #[arg(long)]
        min_distance: Option<u32>,

        /// Discard pairs between chromosomes
        #[arg(long)]
        ignore_trans: bool,

        /// Duplicate removal: none or start-and-end
        #[arg(long)]
        dedup: Option<DuplicateMode>,

        /// Probe file; reports interactions per probe
        #[arg(long)]
        probes: Option<PathBuf>,

        /// Write every interaction once to this file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        /// Print an example configuration
        #[arg(long)]
        example: bool,

        /// Write the effective configuration to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if let Err(err) = run(cli) {
        if let Some(cli_error) = err.chain().find_map(|e| e.downcast_ref::<CliError>()) {
            log::debug!("{:#}", err);
            error::print_error_and_exit(cli_error);
        }
        return Err(err);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(temp_dir) = cli.temp_dir {
        config.store.temp_dir = temp_dir;
    }
    if let Some(threads) = cli.threads {
        config.store.max_concurrent_finalize = threads;
    }

    match cli.command {
        Commands::Import { genome, reads, dedup, presorted, json } => {
            commands::import::execute(&config, genome, reads, dedup, presorted, json)
                .context("Import failed")?;
        }

        Commands::Quantify { genome, probes, reads, dedup, group, replicate_set, out } => {
            commands::quantify::execute(&config, genome, probes, reads, dedup, group, replicate_set, out)
                .context("Quantitation failed")?;
        }

        Commands::HicImport { genome, pairs, min_distance, ignore_trans, dedup, probes, export } => {
            commands::hic::execute(&config, genome, pairs, min_distance, ignore_trans, dedup, probes, export)
                .context("HiC import failed")?;
        }

        Commands::Config { example, output } => {
            if example {
                println!("{}", Config::example_toml()?);
            } else if output.is_none() {
                println!("{}", toml::to_string_pretty(&config).context("Failed to serialize configuration")?);
            }
            if let Some(path) = output {
                config.save_to_file(&path)?;
                log::info!("Configuration written to {}", path.display());
            }
        }
    }

    Ok(())
}
