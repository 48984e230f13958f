//! Data-quality checks over a prepped VCF file.
//!
//! All checks run; every violation is reported and the command fails when at
//! least one check did not pass.

use clap::Parser;
use std::collections::HashSet;
use thousands::Separable;

use crate::common::noodles::open_vcf_reader;
use crate::remove_variants::positioned_id;
use crate::summary::aggregate::VariantSummary;
use crate::summary::csq::{self, CsqFormat};

/// Command line arguments for `check` sub command.
#[derive(Parser, Debug)]
#[command(about = "Run data-quality checks on a prepped VCF file", long_about = None)]
pub struct Args {
    /// Path to the VCF file to check.
    pub input_file: String,

    /// Path to the source VCF file for record-count comparison.
    #[arg(long)]
    pub source_file: Option<String>,
    /// Minimal fraction of source records that must be retained.
    #[arg(long, default_value_t = 0.9)]
    pub min_retention: f64,
}

/// Fields the CSQ format of a prepped file must declare.
const REQUIRED_CSQ_FIELDS: &[&str] = &["Allele", "Consequence", "Feature"];

fn count_records(path: &str) -> Result<usize, anyhow::Error> {
    let mut reader = open_vcf_reader(path)?;
    let header = reader.read_header()?;
    let mut count = 0usize;
    for result in reader.record_bufs(&header) {
        result?;
        count += 1;
    }
    Ok(count)
}

/// Main entry point for `check` sub command.
pub fn run(_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("checking {}", args.input_file);
    let mut failures: Vec<String> = Vec::new();

    let mut reader = open_vcf_reader(&args.input_file)?;
    let header = reader.read_header()?;

    // header checks
    let format = match CsqFormat::from_header(&header) {
        Ok(format) => {
            for name in REQUIRED_CSQ_FIELDS {
                if format.field_index(name).is_none() {
                    failures.push(format!("INFO/CSQ format lacks required field {}", name));
                }
            }
            Some(format)
        }
        Err(e) => {
            failures.push(format!("unusable INFO/CSQ header definition: {}", e));
            None
        }
    };
    let check_citations = header.infos().get("NCITE").is_some()
        && format
            .as_ref()
            .map(|format| format.field_index("PUBMED").is_some())
            .unwrap_or(false);

    // record checks
    let mut total = 0usize;
    let mut seen: HashSet<String> = HashSet::new();
    let mut duplicated = 0usize;
    let mut citation_mismatches = 0usize;
    for result in reader.record_bufs(&header) {
        let record = result?;
        total += 1;

        let identifier = positioned_id(&record);
        if !seen.insert(identifier.clone()) {
            duplicated += 1;
            if duplicated <= 5 {
                failures.push(format!("duplicated positioned identifier {}", identifier));
            }
        }

        if check_citations {
            let format = format.as_ref().expect("format checked above");
            let mut summary = VariantSummary::default();
            for entry in csq::csq_entries(&record) {
                summary.ingest_entry(format, &entry, None)?;
            }
            let expected = summary.summarize(&[]).ncite;
            let actual = match record.info().get("NCITE") {
                Some(Some(noodles::vcf::variant::record_buf::info::field::Value::Integer(
                    value,
                ))) => Some(*value),
                _ => None,
            };
            if expected != actual {
                citation_mismatches += 1;
                if citation_mismatches <= 5 {
                    failures.push(format!(
                        "INFO/NCITE mismatch at {}: expected {:?}, found {:?}",
                        identifier, expected, actual
                    ));
                }
            }
        }
    }
    if duplicated > 5 {
        failures.push(format!(
            "... and {} more duplicated identifiers",
            duplicated - 5
        ));
    }
    if citation_mismatches > 5 {
        failures.push(format!(
            "... and {} more INFO/NCITE mismatches",
            citation_mismatches - 5
        ));
    }

    // record-count retention versus the source file
    if let Some(source_file) = &args.source_file {
        let source_total = count_records(source_file)?;
        let threshold = source_total as f64 * args.min_retention;
        if (total as f64) < threshold {
            failures.push(format!(
                "only {} of {} source records retained (threshold {:.1})",
                total, source_total, threshold
            ));
        }
    }

    if failures.is_empty() {
        tracing::info!(
            "all checks passed over {} records",
            total.separate_with_commas()
        );
        Ok(())
    } else {
        anyhow::bail!(
            "{} check(s) failed:\n{}",
            failures.len(),
            failures.join("\n")
        );
    }
}
