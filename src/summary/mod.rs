//! Per-variant summary statistics from VEP CSQ annotation.

pub mod aggregate;
pub mod allele;
pub mod csq;
pub mod populations;

use std::time::Instant;

use clap::Parser;
use noodles::vcf::header::record::value::map::{
    info::{Number, Type},
    Info, Map,
};
use noodles::vcf::variant::io::Write as _;
use noodles::vcf::variant::record_buf::info::field::{value::Array, Value};
use noodles::vcf::variant::record_buf::RecordBuf;
use noodles::vcf::Header as VcfHeader;
use thousands::Separable;

use crate::common::noodles::{open_vcf_reader, open_vcf_writer};
use aggregate::VariantSummary;
use csq::CsqFormat;
use populations::FrequencySource;

/// Command line arguments for `summary-stats` sub command.
#[derive(Parser, Debug)]
#[command(about = "Compute summary statistics from VEP annotation", long_about = None)]
pub struct Args {
    /// Species production name.
    pub species: String,
    /// Assembly name of the input file.
    pub assembly: String,
    /// Path to the input VCF file.
    pub input_file: String,

    /// Path to the output VCF file.
    #[arg(short = 'O', long)]
    pub output_file: Option<String>,
    /// Path to the population/frequency configuration JSON file.
    #[arg(long)]
    pub frequencies: Option<String>,
}

/// INFO field names written by this sub command.
const SUMMARY_FIELDS: &[&str] = &["RAF", "NTCSQ", "NRCSQ", "NGENE", "NVPHN", "NGPHN", "NCITE"];

/// CSQ fields that every usable input file must declare.
const REQUIRED_CSQ_FIELDS: &[&str] = &["Allele", "Consequence", "Feature"];

fn build_header(header_in: &VcfHeader, frequency: Option<&FrequencySource>) -> VcfHeader {
    let mut header_out = header_in.clone();

    let raf_description = match frequency {
        Some(frequency) if !frequency.display_name.is_empty() => format!(
            "Allele frequencies from representative population ({})",
            frequency.display_name
        ),
        _ => String::from("Allele frequencies from representative population"),
    };

    let definitions = [
        (
            "RAF",
            Number::AlternateBases,
            Type::Float,
            raf_description,
        ),
        (
            "NTCSQ",
            Number::AlternateBases,
            Type::Integer,
            String::from("Number of transcript consequences"),
        ),
        (
            "NRCSQ",
            Number::AlternateBases,
            Type::Integer,
            String::from("Number of regulatory consequences"),
        ),
        (
            "NGENE",
            Number::AlternateBases,
            Type::Integer,
            String::from("Number of overlapped gene"),
        ),
        (
            "NVPHN",
            Number::AlternateBases,
            Type::Integer,
            String::from("Number of associated variant-linked phenotypes"),
        ),
        (
            "NGPHN",
            Number::AlternateBases,
            Type::Integer,
            String::from("Number of associated gene-linked phenotypes"),
        ),
        (
            "NCITE",
            Number::Count(1),
            Type::Integer,
            String::from("Number of citations"),
        ),
    ];

    for (id, number, ty, description) in definitions {
        let map = Map::<Info>::new(number, ty, description);
        if let Some(existing) = header_out.infos().get(id) {
            if existing != &map {
                tracing::warn!("replacing conflicting INFO/{} header definition", id);
            }
        }
        // Insertion replaces an existing definition in place so each field
        // ends up defined exactly once.
        header_out.infos_mut().insert(id.to_string(), map);
    }

    header_out
}

/// Map per-allele integer counts onto an INFO value.
///
/// One alternate allele gives a scalar, several give a "."-padded list in
/// allele order; all-absent positions omit the field.
fn integer_value(counts: &[Option<i32>]) -> Option<Value> {
    if counts.iter().all(Option::is_none) {
        None
    } else if counts.len() == 1 {
        counts[0].map(Value::Integer)
    } else {
        Some(Value::Array(Array::Integer(counts.to_vec())))
    }
}

/// Same mapping as `integer_value` for the frequency values.
fn float_value(values: &[Option<f32>]) -> Option<Value> {
    if values.iter().all(Option::is_none) {
        None
    } else if values.len() == 1 {
        values[0].map(Value::Float)
    } else {
        Some(Value::Array(Array::Float(values.to_vec())))
    }
}

/// Aggregate the CSQ entries of `record` and rewrite its summary INFO fields.
fn annotate_record(
    record: &mut RecordBuf,
    format: &CsqFormat,
    frequency: Option<&FrequencySource>,
) -> Result<(), anyhow::Error> {
    let allele_order = allele::minimise_alleles(
        record.reference_bases(),
        record.alternate_bases().as_ref(),
    );

    let mut summary = VariantSummary::default();
    for entry in csq::csq_entries(record) {
        summary.ingest_entry(format, &entry, frequency)?;
    }
    let values = summary.summarize(&allele_order);

    // Rebuild the INFO fields without any stale summary values so that
    // re-running the command on its own output is a no-op.
    let mut fields: Vec<(String, Option<Value>)> = record
        .info()
        .as_ref()
        .iter()
        .filter(|(key, _)| !SUMMARY_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    for (key, value) in [
        ("RAF", float_value(&values.raf)),
        ("NTCSQ", integer_value(&values.ntcsq)),
        ("NRCSQ", integer_value(&values.nrcsq)),
        ("NGENE", integer_value(&values.ngene)),
        ("NVPHN", integer_value(&values.nvphn)),
        ("NGPHN", integer_value(&values.ngphn)),
        ("NCITE", values.ncite.map(Value::Integer)),
    ] {
        if let Some(value) = value {
            fields.push((key.to_string(), Some(value)));
        }
    }

    *record.info_mut() = fields.into_iter().collect();

    Ok(())
}

/// Main entry point for `summary-stats` sub command.
pub fn run(_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let output_file = args
        .output_file
        .clone()
        .unwrap_or_else(|| crate::common::prefixed_output_path(&args.input_file, "summary_stats_"));
    tracing::info!(
        "computing summary statistics for {} ({}): {} -> {}",
        args.species,
        args.assembly,
        args.input_file,
        output_file
    );

    let frequency = FrequencySource::for_species(&args.species, args.frequencies.as_deref())?;
    match &frequency {
        Some(frequency) => tracing::info!(
            "representative frequencies come from {}",
            frequency.display_name
        ),
        None => tracing::warn!(
            "no representative frequency source configured for {}",
            args.species
        ),
    }

    let mut reader = open_vcf_reader(&args.input_file)?;
    let header_in = reader.read_header()?;

    let format = CsqFormat::from_header(&header_in)?;
    for name in REQUIRED_CSQ_FIELDS {
        if format.field_index(name).is_none() {
            anyhow::bail!("INFO/CSQ format does not declare required field {}", name);
        }
    }

    let header_out = build_header(&header_in, frequency.as_ref());
    let mut writer = open_vcf_writer(&output_file)?;
    writer.write_header(&header_out)?;

    tracing::info!("Processing variants ...");
    let start = Instant::now();
    let mut total_written = 0usize;
    for result in reader.record_bufs(&header_in) {
        let mut record = result?;
        annotate_record(&mut record, &format, frequency.as_ref())?;
        writer.write_variant_record(&header_out, &record)?;

        total_written += 1;
        if total_written % 100_000 == 0 {
            tracing::info!(
                "... processed {} records",
                total_written.separate_with_commas()
            );
        }
    }
    tracing::info!(
        "... done processing {} records in {:?}",
        total_written.separate_with_commas(),
        start.elapsed()
    );

    Ok(())
}

#[cfg(test)]
mod test {
    use clap_verbosity_flag::Verbosity;
    use noodles::vcf::variant::record_buf::info::field::{value::Array, Value};
    use pretty_assertions::assert_eq;
    use temp_testdir::TempDir;

    use super::{run, Args};

    fn read_all(
        path: &str,
    ) -> Result<
        (
            noodles::vcf::Header,
            Vec<noodles::vcf::variant::record_buf::RecordBuf>,
        ),
        anyhow::Error,
    > {
        let mut reader = crate::common::noodles::open_vcf_reader(path)?;
        let header = reader.read_header()?;
        let records = reader
            .record_bufs(&header)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((header, records))
    }

    #[test]
    fn smoke_test() -> Result<(), anyhow::Error> {
        let temp = TempDir::default();
        let path_out = temp.join("output.vcf");

        let args_common = crate::common::Args {
            verbose: Verbosity::new(0, 0),
        };
        let args = Args {
            species: String::from("homo_sapiens"),
            assembly: String::from("GRCh38"),
            input_file: String::from("tests/data/summary/input.vcf"),
            output_file: Some(path_out.to_str().expect("invalid path").to_string()),
            frequencies: None,
        };

        run(&args_common, &args)?;

        let (header, records) = read_all(path_out.to_str().expect("invalid path"))?;

        let raf = header.infos().get("RAF").expect("RAF defined");
        assert_eq!(
            raf.description(),
            "Allele frequencies from representative population (gnomAD genomes v3.1.2)"
        );
        assert!(header.infos().get("NCITE").is_some());

        assert_eq!(records.len(), 3);

        // single-alt record; Number=A fields read back as one-element arrays
        let info = records[0].info();
        assert_eq!(
            info.get("NTCSQ"),
            Some(Some(&Value::Array(Array::Integer(vec![Some(2)]))))
        );
        assert_eq!(
            info.get("NGENE"),
            Some(Some(&Value::Array(Array::Integer(vec![Some(1)]))))
        );
        assert_eq!(
            info.get("NGPHN"),
            Some(Some(&Value::Array(Array::Integer(vec![Some(1)]))))
        );
        assert_eq!(info.get("NCITE"), Some(Some(&Value::Integer(2))));
        assert_eq!(
            info.get("RAF"),
            Some(Some(&Value::Array(Array::Float(vec![Some(0.5)]))))
        );
        assert_eq!(info.get("NVPHN"), None);

        // multi-alt record: "."-padded lists in minimised allele order
        let info = records[1].info();
        assert_eq!(
            info.get("NTCSQ"),
            Some(Some(&Value::Array(Array::Integer(vec![Some(1), None]))))
        );
        assert_eq!(
            info.get("NGENE"),
            Some(Some(&Value::Array(Array::Integer(vec![Some(1), None]))))
        );
        assert_eq!(info.get("RAF"), None);
        assert_eq!(info.get("NCITE"), None);

        // trivial consequences only: everything omitted
        let info = records[2].info();
        assert_eq!(info.get("NTCSQ"), None);
        assert_eq!(info.get("NRCSQ"), None);
        assert_eq!(info.get("NGENE"), None);

        Ok(())
    }

    #[test]
    fn conflicting_header_definitions_are_replaced() -> Result<(), anyhow::Error> {
        use noodles::vcf::header::record::value::map::info::{Number, Type};

        let temp = TempDir::default();
        let path_out = temp.join("output.vcf");

        let args_common = crate::common::Args {
            verbose: Verbosity::new(0, 0),
        };
        let args = Args {
            species: String::from("homo_sapiens"),
            assembly: String::from("GRCh38"),
            input_file: String::from("tests/data/summary/input_conflicting_header.vcf"),
            output_file: Some(path_out.to_str().expect("invalid path").to_string()),
            frequencies: None,
        };

        run(&args_common, &args)?;

        // the stale definitions from the input are replaced by the catalogue
        let (header, _) = read_all(path_out.to_str().expect("invalid path"))?;
        let ncite = header.infos().get("NCITE").expect("NCITE defined");
        assert_eq!(ncite.number(), Number::Count(1));
        assert_eq!(ncite.ty(), Type::Integer);
        assert_eq!(ncite.description(), "Number of citations");
        let raf = header.infos().get("RAF").expect("RAF defined");
        assert_eq!(raf.number(), Number::AlternateBases);
        assert_eq!(raf.ty(), Type::Float);

        // exactly one definition per field in the raw header text
        let text = std::fs::read_to_string(&path_out)?;
        assert_eq!(text.matches("##INFO=<ID=NCITE,").count(), 1);
        assert_eq!(text.matches("##INFO=<ID=RAF,").count(), 1);

        Ok(())
    }

    #[test]
    fn smoke_test_is_idempotent() -> Result<(), anyhow::Error> {
        let temp = TempDir::default();
        let path_once = temp.join("once.vcf");
        let path_twice = temp.join("twice.vcf");

        let args_common = crate::common::Args {
            verbose: Verbosity::new(0, 0),
        };
        let args = Args {
            species: String::from("homo_sapiens"),
            assembly: String::from("GRCh38"),
            input_file: String::from("tests/data/summary/input.vcf"),
            output_file: Some(path_once.to_str().expect("invalid path").to_string()),
            frequencies: None,
        };
        run(&args_common, &args)?;

        let args = Args {
            input_file: path_once.to_str().expect("invalid path").to_string(),
            output_file: Some(path_twice.to_str().expect("invalid path").to_string()),
            ..args
        };
        run(&args_common, &args)?;

        let once = std::fs::read_to_string(&path_once)?;
        let twice = std::fs::read_to_string(&path_twice)?;
        assert_eq!(once, twice);

        Ok(())
    }
}
