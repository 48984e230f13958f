//! Main entry point for the vcf-prepper CLI.

use clap::{command, Parser, Subcommand};

use vcf_prepper::{check, common, freqs, remove_variants, summary, update_fields};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Preparation of variant VCF files for annotation track pipelines"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute per-variant summary statistics from CSQ annotation.
    SummaryStats(summary::Args),
    /// Rename chromosomes and rewrite identifier/source fields.
    UpdateFields(update_fields::Args),
    /// Remove duplicated variants and variants on unwanted regions.
    RemoveVariants(remove_variants::Args),
    /// Compute population allele frequencies from the genotype matrix.
    FrequencyFromGt(freqs::Args),
    /// Run data-quality checks on a prepped VCF file.
    Check(check::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    tracing::subscriber::with_default(collector, || {
        tracing::info!("vcf-prepper startup");

        match &cli.command {
            Commands::SummaryStats(args) => summary::run(&cli.common, args)?,
            Commands::UpdateFields(args) => update_fields::run(&cli.common, args)?,
            Commands::RemoveVariants(args) => remove_variants::run(&cli.common, args)?,
            Commands::FrequencyFromGt(args) => freqs::run(&cli.common, args)?,
            Commands::Check(args) => check::run(&cli.common, args)?,
        }

        tracing::info!("All done. Have a nice day!");

        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}
