//! Renaming of chromosomes and rewriting of identifier/source fields.
//!
//! The output file gets a fresh minimal header: the file format line, the
//! `SOURCE` INFO definition and optionally a contig line per requested
//! chromosome.  Everything else from the input header is dropped.

use std::time::Instant;

use clap::Parser;
use indexmap::IndexMap;
use noodles::vcf::header::record::value::map::{
    info::{Number, Type},
    Contig, Info, Map,
};
use noodles::vcf::header::FileFormat;
use noodles::vcf::variant::io::Write as _;
use noodles::vcf::variant::record_buf::info::field::Value;
use noodles::vcf::variant::record_buf::{Ids, RecordBuf};
use noodles::vcf::Header as VcfHeader;
use thousands::Separable;

use crate::common::noodles::{open_vcf_reader, open_vcf_writer};

/// Command line arguments for `update-fields` sub command.
#[derive(Parser, Debug)]
#[command(about = "Rename chromosomes and rewrite identifier/source fields", long_about = None)]
pub struct Args {
    /// Path to the input VCF file.
    pub input_file: String,
    /// Source of the variation data, written as INFO/SOURCE.
    pub source: String,
    /// Path to the tab separated chromosome synonym file.
    pub synonym_file: String,

    /// Rewrite ClinVar identifiers into VCV accessions (ClinVar source only).
    #[arg(long)]
    pub rename_clinvar_ids: bool,
    /// Comma separated list of chromosomes to put into the header.
    #[arg(long)]
    pub chromosomes: Option<String>,
    /// Path to the output VCF file.
    #[arg(short = 'O', long)]
    pub output_file: Option<String>,
}

/// Rewrite a bare ClinVar variation identifier into its VCV accession.
fn format_clinvar_id(id: &str) -> String {
    if id.starts_with("VCV") {
        id.to_string()
    } else {
        format!("VCV{:0>9}", id)
    }
}

/// Load the chromosome synonym file into a name mapping.
fn load_synonyms(path: &str) -> Result<IndexMap<String, String>, anyhow::Error> {
    let mut synonyms = IndexMap::new();
    let mut reader = crate::common::io::open_tsv_reader(path)?;
    for result in reader.records() {
        let record = result?;
        if record.len() < 2 {
            anyhow::bail!("synonym file {} has a row with fewer than two columns", path);
        }
        synonyms.insert(record[0].trim().to_string(), record[1].trim().to_string());
    }
    Ok(synonyms)
}

fn build_header(chromosomes: Option<&str>, synonyms: &IndexMap<String, String>) -> VcfHeader {
    let mut builder = VcfHeader::builder()
        .set_file_format(FileFormat::new(4, 2))
        .add_info(
            "SOURCE",
            Map::<Info>::new(
                Number::Count(1),
                Type::String,
                "Source of the variation data",
            ),
        );

    if let Some(chromosomes) = chromosomes {
        for chromosome in chromosomes.split(',') {
            let name = synonyms
                .get(chromosome)
                .cloned()
                .unwrap_or_else(|| chromosome.to_string());
            builder = builder.add_contig(name, Map::<Contig>::new());
        }
    }

    builder.build()
}

/// Build the output record: renamed chromosome, formatted identifiers and a
/// single `SOURCE` INFO field; QUAL and FILTER are dropped.
fn update_record(
    record: &RecordBuf,
    synonyms: &IndexMap<String, String>,
    source: &str,
    rename_clinvar_ids: bool,
) -> RecordBuf {
    let chrom = synonyms
        .get(record.reference_sequence_name())
        .map(String::as_str)
        .unwrap_or_else(|| record.reference_sequence_name());

    let ids: Ids = record
        .ids()
        .as_ref()
        .iter()
        .map(|id| {
            if rename_clinvar_ids {
                format_clinvar_id(id)
            } else {
                id.clone()
            }
        })
        .collect();

    let mut builder = RecordBuf::builder()
        .set_reference_sequence_name(chrom)
        .set_ids(ids)
        .set_reference_bases(record.reference_bases())
        .set_alternate_bases(record.alternate_bases().clone())
        .set_info(
            [(
                String::from("SOURCE"),
                Some(Value::String(source.to_string())),
            )]
            .into_iter()
            .collect(),
        );
    if let Some(start) = record.variant_start() {
        builder = builder.set_variant_start(start);
    }

    builder.build()
}

/// Main entry point for `update-fields` sub command.
pub fn run(_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let output_file = args.output_file.clone().unwrap_or_else(|| {
        crate::common::replaced_output_path(
            &args.input_file,
            ".vcf.gz",
            "_renamed.vcf.gz",
            "renamed_",
        )
    });
    tracing::info!(
        "updating fields (source {}): {} -> {}",
        args.source,
        args.input_file,
        output_file
    );

    let synonyms = load_synonyms(&args.synonym_file)?;
    let rename_clinvar_ids = args.rename_clinvar_ids && args.source == "ClinVar";

    let mut reader = open_vcf_reader(&args.input_file)?;
    let header_in = reader.read_header()?;
    let header_out = build_header(args.chromosomes.as_deref(), &synonyms);

    let mut writer = open_vcf_writer(&output_file)?;
    writer.write_header(&header_out)?;

    let start = Instant::now();
    let mut total_written = 0usize;
    for result in reader.record_bufs(&header_in) {
        let record = result?;
        let record = update_record(&record, &synonyms, &args.source, rename_clinvar_ids);
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
        "... done writing {} records in {:?}",
        total_written.separate_with_commas(),
        start.elapsed()
    );

    Ok(())
}

#[cfg(test)]
mod test {
    use clap_verbosity_flag::Verbosity;
    use noodles::vcf::variant::record_buf::info::field::Value;
    use pretty_assertions::assert_eq;
    use temp_testdir::TempDir;

    use super::{format_clinvar_id, run, Args};

    #[rstest::rstest]
    #[case("12345", "VCV000012345")]
    #[case("987654321", "VCV987654321")]
    #[case("VCV000012345", "VCV000012345")]
    fn clinvar_accessions(#[case] id: &str, #[case] expected: &str) {
        assert_eq!(format_clinvar_id(id), expected);
    }

    #[test]
    fn smoke_test() -> Result<(), anyhow::Error> {
        let temp = TempDir::default();
        let path_out = temp.join("output.vcf");

        let args_common = crate::common::Args {
            verbose: Verbosity::new(0, 0),
        };
        let args = Args {
            input_file: String::from("tests/data/update_fields/input.vcf"),
            source: String::from("ClinVar"),
            synonym_file: String::from("tests/data/update_fields/synonyms.tsv"),
            rename_clinvar_ids: true,
            chromosomes: Some(String::from("chr1,chr2")),
            output_file: Some(path_out.to_str().expect("invalid path").to_string()),
        };

        run(&args_common, &args)?;

        let mut reader =
            crate::common::noodles::open_vcf_reader(path_out.to_str().expect("invalid path"))?;
        let header = reader.read_header()?;

        // fresh minimal header with mapped contig names
        assert!(header.infos().get("SOURCE").is_some());
        assert!(header.infos().get("CSQ").is_none());
        assert_eq!(
            header.contigs().keys().cloned().collect::<Vec<_>>(),
            vec![String::from("1"), String::from("2")]
        );

        let records = reader
            .record_bufs(&header)
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].reference_sequence_name(), "1");
        assert_eq!(
            records[0].ids().as_ref().iter().cloned().collect::<Vec<_>>(),
            vec![String::from("VCV000012345")]
        );
        assert_eq!(
            records[0].info().get("SOURCE"),
            Some(Some(&Value::String(String::from("ClinVar"))))
        );

        // chromosome without a synonym keeps its name
        assert_eq!(records[1].reference_sequence_name(), "chrUn_KI270752v1");

        Ok(())
    }
}
