//! Removal of duplicated variants and variants on unwanted regions.
//!
//! Works in two passes: the first one marks every variant identity that
//! occurs more than once (or lies on a patch region), the second one copies
//! the surviving records.  When an identity is removed, all of its records
//! are removed.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use clap::Parser;
use itertools::Itertools;
use noodles::vcf::variant::io::Write as _;
use noodles::vcf::variant::record_buf::RecordBuf;
use thousands::Separable;

use crate::common::noodles::{open_vcf_reader, open_vcf_writer};

/// Command line arguments for `remove-variants` sub command.
#[derive(Parser, Debug)]
#[command(about = "Remove duplicated variants and variants on unwanted regions", long_about = None)]
pub struct Args {
    /// Path to the input VCF file.
    pub input_file: String,

    /// Path to a tab separated file with chromosome sizes; variants on
    /// chromosomes not listed there are removed.
    #[arg(long)]
    pub chrom_sizes: Option<String>,
    /// Deduplicate by bare identifier instead of positioned identifier.
    #[arg(long)]
    pub remove_nonunique_ids: bool,
    /// Remove variants on patch/test regions.
    #[arg(long)]
    pub remove_patch_regions: bool,
    /// Path to the output VCF file.
    #[arg(short = 'O', long)]
    pub output_file: Option<String>,
}

/// The positioned identifier `chrom:pos:id` of a record.
pub fn positioned_id(record: &RecordBuf) -> String {
    let ids = record.ids();
    let id = if ids.as_ref().is_empty() {
        String::from("unknown")
    } else {
        ids.as_ref().iter().join(";")
    };
    format!(
        "{}:{}:{}",
        record.reference_sequence_name(),
        record.variant_start().map(usize::from).unwrap_or_default(),
        id
    )
}

/// The bare identifier of a record.
pub fn plain_id(record: &RecordBuf) -> String {
    let ids = record.ids();
    if ids.as_ref().is_empty() {
        String::from(".")
    } else {
        ids.as_ref().iter().join(";")
    }
}

fn record_identifier(record: &RecordBuf, by_bare_id: bool) -> String {
    if by_bare_id {
        plain_id(record)
    } else {
        positioned_id(record)
    }
}

fn is_patch_region(chrom: &str) -> bool {
    chrom.contains("CTG") || chrom.contains("PATCH") || chrom.contains("TEST")
}

/// First pass: mark each identity for removal when it occurs more than once
/// or lies on a patch region.
fn generate_removal_status(args: &Args) -> Result<HashMap<String, bool>, anyhow::Error> {
    let mut removal_status: HashMap<String, bool> = HashMap::new();

    let mut reader = open_vcf_reader(&args.input_file)?;
    let header = reader.read_header()?;
    for result in reader.record_bufs(&header) {
        let record = result?;
        let identifier = record_identifier(&record, args.remove_nonunique_ids);
        // The uniqueness check rests on prior existence of the key, so it
        // has to happen before the insert.
        let mut status = removal_status.contains_key(&identifier);
        if args.remove_patch_regions {
            status = status || is_patch_region(record.reference_sequence_name());
        }
        removal_status.insert(identifier, status);
    }

    Ok(removal_status)
}

/// Read the first column of a chromosome sizes file.
fn parse_chrom_sizes(path: &str) -> Result<HashSet<String>, anyhow::Error> {
    let mut valid_chroms = HashSet::new();
    let mut reader = crate::common::io::open_tsv_reader(path)?;
    for result in reader.records() {
        let record = result?;
        if let Some(chrom) = record.get(0) {
            valid_chroms.insert(chrom.trim().to_string());
        }
    }

    if valid_chroms.is_empty() {
        tracing::warn!("{} does not list any chromosome, should be checked", path);
    }

    Ok(valid_chroms)
}

/// Main entry point for `remove-variants` sub command.
pub fn run(_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let output_file = args.output_file.clone().unwrap_or_else(|| {
        crate::common::replaced_output_path(&args.input_file, "renamed", "processed", "processed_")
    });
    tracing::info!("removing variants: {} -> {}", args.input_file, output_file);

    let removal_status = generate_removal_status(args)?;

    let valid_chroms = args
        .chrom_sizes
        .as_deref()
        .map(parse_chrom_sizes)
        .transpose()?;

    let mut reader = open_vcf_reader(&args.input_file)?;
    let header = reader.read_header()?;
    let mut writer = open_vcf_writer(&output_file)?;
    writer.write_header(&header)?;

    let start = Instant::now();
    let mut total_written = 0usize;
    let mut total_removed = 0usize;
    for result in reader.record_bufs(&header) {
        let record = result?;

        let identifier = record_identifier(&record, args.remove_nonunique_ids);
        if removal_status.get(&identifier).copied().unwrap_or(false) {
            total_removed += 1;
            continue;
        }

        if let Some(valid_chroms) = &valid_chroms {
            if !valid_chroms.contains(record.reference_sequence_name()) {
                total_removed += 1;
                continue;
            }
        }

        writer.write_variant_record(&header, &record)?;
        total_written += 1;
    }
    tracing::info!(
        "... kept {} and removed {} records in {:?}",
        total_written.separate_with_commas(),
        total_removed.separate_with_commas(),
        start.elapsed()
    );

    Ok(())
}
