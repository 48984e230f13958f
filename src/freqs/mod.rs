//! Population allele frequencies computed from the genotype matrix.
//!
//! Sample to population assignments come from a tab separated dump with one
//! `sample<TAB>population` row per membership.  For every population `POP`
//! the INFO fields `POP_AC`, `POP_AN` and `POP_AF` are written; the
//! population/frequency configuration document consumed by `summary-stats`
//! can be emitted on the side.

use std::time::Instant;

use clap::Parser;
use indexmap::{IndexMap, IndexSet};
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
use crate::summary::populations::{
    FieldNames, IncludeField, Population, PopulationConfig, PopulationFile,
};

/// Command line arguments for `frequency-from-gt` sub command.
#[derive(Parser, Debug)]
#[command(about = "Compute population allele frequencies from genotypes", long_about = None)]
pub struct Args {
    /// Path to the input VCF file with genotypes.
    pub input_file: String,

    /// Path to the tab separated sample to population mapping file.
    #[arg(long)]
    pub sample_populations: String,
    /// Prefix to prepend to each VCF sample name before lookup.
    #[arg(long)]
    pub sample_prefix: Option<String>,
    /// Name of the root population written to the configuration document.
    #[arg(long, default_value = "UNSPECIFIED")]
    pub root_population: String,
    /// Species production name for the configuration document.
    #[arg(long)]
    pub species: Option<String>,
    /// Path to write a population configuration JSON document to.
    #[arg(long)]
    pub emit_config: Option<String>,
    /// Path to the output VCF file.
    #[arg(short = 'O', long)]
    pub output_file: Option<String>,
}

/// Sample to population assignments, with the populations in first-appearance
/// order.
#[derive(Debug, Default)]
pub struct SamplePopulations {
    /// All population names.
    pub populations: IndexSet<String>,
    /// Assignments per sample; a sample may belong to several populations.
    pub by_sample: IndexMap<String, Vec<String>>,
}

impl SamplePopulations {
    /// Load the assignments from a tab separated dump.
    pub fn load(path: &str) -> Result<Self, anyhow::Error> {
        let mut result = Self::default();
        let mut reader = crate::common::io::open_tsv_reader(path)?;
        for row in reader.records() {
            let row = row?;
            if row.len() < 2 {
                anyhow::bail!(
                    "sample population file {} has a row with fewer than two columns",
                    path
                );
            }
            let sample = row[0].trim().to_string();
            let population = row[1].trim().to_string();
            result.populations.insert(population.clone());
            result.by_sample.entry(sample).or_default().push(population);
        }

        if result.by_sample.is_empty() {
            anyhow::bail!("sample population file {} assigns no samples", path);
        }

        Ok(result)
    }
}

fn build_header(header_in: &VcfHeader, populations: &IndexSet<String>) -> VcfHeader {
    let mut header_out = header_in.clone();

    let base_definitions = [
        (
            String::from("AC"),
            Number::AlternateBases,
            Type::Integer,
            String::from("Total number of alternate alleles in called genotypes"),
        ),
        (
            String::from("AN"),
            Number::Count(1),
            Type::Integer,
            String::from("Total number of alleles in called genotypes"),
        ),
        (
            String::from("AF"),
            Number::AlternateBases,
            Type::Float,
            String::from("Estimated Allele Frequencies"),
        ),
    ];
    for (id, number, ty, description) in base_definitions {
        if header_out.infos().get(&id).is_none() {
            header_out
                .infos_mut()
                .insert(id, Map::<Info>::new(number, ty, description));
        }
    }

    for population in populations {
        header_out.infos_mut().insert(
            format!("{}_AC", population),
            Map::<Info>::new(
                Number::AlternateBases,
                Type::Integer,
                format!(
                    "Total number of alternate alleles in {} population",
                    population
                ),
            ),
        );
        header_out.infos_mut().insert(
            format!("{}_AN", population),
            Map::<Info>::new(
                Number::Count(1),
                Type::Integer,
                format!("Total number of alleles in {} population", population),
            ),
        );
        header_out.infos_mut().insert(
            format!("{}_AF", population),
            Map::<Info>::new(
                Number::AlternateBases,
                Type::Float,
                format!("Estimated Allele Frequencies in {} population", population),
            ),
        );
    }

    header_out
}

/// Count genotype alleles of one record into per-population AC/AN tallies.
fn count_alleles(
    record: &RecordBuf,
    header: &VcfHeader,
    sample_populations: &SamplePopulations,
    sample_prefix: Option<&str>,
) -> (Vec<Vec<i32>>, Vec<i32>) {
    use noodles::vcf::variant::record_buf::samples::sample::value::Value as SampleValue;

    let allele_cnt = record.alternate_bases().as_ref().len();
    let mut acs = vec![vec![0i32; allele_cnt]; sample_populations.populations.len()];
    let mut ans = vec![0i32; sample_populations.populations.len()];

    for (name, sample) in header
        .sample_names()
        .iter()
        .zip(record.samples().values())
    {
        let name = match sample_prefix {
            Some(prefix) => format!("{}{}", prefix, name),
            None => name.clone(),
        };
        let Some(memberships) = sample_populations.by_sample.get(&name) else {
            continue;
        };

        let Some(Some(SampleValue::Genotype(genotype))) = sample.get("GT") else {
            continue;
        };
        for allele in genotype.as_ref() {
            let Some(position) = allele.position() else {
                continue;
            };
            for population in memberships {
                let idx = sample_populations
                    .populations
                    .get_index_of(population)
                    .expect("population registered at load time");
                ans[idx] += 1;
                if position > 0 && position <= allele_cnt {
                    acs[idx][position - 1] += 1;
                }
            }
        }
    }

    (acs, ans)
}

/// Write the per-population INFO fields into the record.
fn annotate_record(
    record: &mut RecordBuf,
    populations: &IndexSet<String>,
    acs: &[Vec<i32>],
    ans: &[i32],
) {
    for (idx, population) in populations.iter().enumerate() {
        let an = ans[idx];
        let (ac_values, af_values) = if an == 0 {
            (
                vec![None; acs[idx].len()],
                vec![None; acs[idx].len()],
            )
        } else {
            (
                acs[idx].iter().map(|ac| Some(*ac)).collect(),
                acs[idx]
                    .iter()
                    .map(|ac| Some(*ac as f32 / an as f32))
                    .collect(),
            )
        };

        record.info_mut().insert(
            format!("{}_AC", population),
            Some(Value::Array(Array::Integer(ac_values))),
        );
        record
            .info_mut()
            .insert(format!("{}_AN", population), Some(Value::Integer(an)));
        record.info_mut().insert(
            format!("{}_AF", population),
            Some(Value::Array(Array::Float(af_values))),
        );
    }
}

/// Emit the configuration document consumed by `summary-stats`.
fn emit_config(args: &Args, populations: &IndexSet<String>, output_file: &str) -> Result<(), anyhow::Error> {
    let Some(config_path) = &args.emit_config else {
        return Ok(());
    };
    let species = args
        .species
        .clone()
        .ok_or_else(|| anyhow::anyhow!("--species is required together with --emit-config"))?;

    let include_fields = populations
        .iter()
        .map(|population| IncludeField {
            name: population.clone(),
            fields: FieldNames {
                af: Some(format!("{}_AF", population)),
                ac: Some(format!("{}_AC", population)),
                an: Some(format!("{}_AN", population)),
            },
        })
        .collect();

    let mut config = PopulationConfig::new();
    config.insert(
        species,
        vec![Population {
            name: args.root_population.clone(),
            files: vec![PopulationFile {
                file_location: output_file.to_string(),
                short_name: args.root_population.clone(),
                include_fields,
            }],
        }],
    );

    let file = std::fs::File::create(config_path)?;
    serde_json::to_writer_pretty(file, &config)?;
    tracing::info!("wrote population configuration to {}", config_path);

    Ok(())
}

/// Main entry point for `frequency-from-gt` sub command.
pub fn run(_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let output_file = args.output_file.clone().unwrap_or_else(|| {
        crate::common::replaced_output_path(&args.input_file, ".vcf.gz", "_freq.vcf.gz", "freq_")
    });
    tracing::info!(
        "computing population frequencies: {} -> {}",
        args.input_file,
        output_file
    );

    let sample_populations = SamplePopulations::load(&args.sample_populations)?;
    tracing::info!(
        "loaded {} samples over {} populations",
        sample_populations.by_sample.len().separate_with_commas(),
        sample_populations.populations.len()
    );

    let mut reader = open_vcf_reader(&args.input_file)?;
    let header_in = reader.read_header()?;
    if header_in.sample_names().is_empty() {
        anyhow::bail!("input file {} carries no genotype samples", args.input_file);
    }

    let header_out = build_header(&header_in, &sample_populations.populations);
    let mut writer = open_vcf_writer(&output_file)?;
    writer.write_header(&header_out)?;

    let start = Instant::now();
    let mut total_written = 0usize;
    for result in reader.record_bufs(&header_in) {
        let mut record = result?;
        let (acs, ans) = count_alleles(
            &record,
            &header_in,
            &sample_populations,
            args.sample_prefix.as_deref(),
        );
        annotate_record(&mut record, &sample_populations.populations, &acs, &ans);
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

    emit_config(args, &sample_populations.populations, &output_file)?;

    Ok(())
}

#[cfg(test)]
mod test {
    use clap_verbosity_flag::Verbosity;
    use noodles::vcf::variant::record_buf::info::field::{value::Array, Value};
    use pretty_assertions::assert_eq;
    use temp_testdir::TempDir;

    use super::{run, Args, SamplePopulations};

    #[test]
    fn load_sample_populations() -> Result<(), anyhow::Error> {
        let sample_populations =
            SamplePopulations::load("tests/data/freqs/sample_populations.tsv")?;

        assert_eq!(
            sample_populations
                .populations
                .iter()
                .cloned()
                .collect::<Vec<_>>(),
            vec![String::from("EUR"), String::from("AFR")]
        );
        assert_eq!(
            sample_populations.by_sample.get("NA00001"),
            Some(&vec![String::from("EUR")])
        );
        // NA00003 belongs to both populations
        assert_eq!(
            sample_populations.by_sample.get("NA00003"),
            Some(&vec![String::from("EUR"), String::from("AFR")])
        );

        Ok(())
    }

    #[test]
    fn smoke_test() -> Result<(), anyhow::Error> {
        let temp = TempDir::default();
        let path_out = temp.join("output.vcf");
        let path_config = temp.join("population_data.json");

        let args_common = crate::common::Args {
            verbose: Verbosity::new(0, 0),
        };
        let args = Args {
            input_file: String::from("tests/data/freqs/input.vcf"),
            sample_populations: String::from("tests/data/freqs/sample_populations.tsv"),
            sample_prefix: None,
            root_population: String::from("1000GENOMES"),
            species: Some(String::from("homo_sapiens")),
            emit_config: Some(path_config.to_str().expect("invalid path").to_string()),
            output_file: Some(path_out.to_str().expect("invalid path").to_string()),
        };

        run(&args_common, &args)?;

        let mut reader =
            crate::common::noodles::open_vcf_reader(path_out.to_str().expect("invalid path"))?;
        let header = reader.read_header()?;
        assert!(header.infos().get("EUR_AC").is_some());
        assert!(header.infos().get("AFR_AF").is_some());

        let records = reader
            .record_bufs(&header)
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(records.len(), 2);

        // record 1: EUR genotypes 0/1 (NA00001), 1/1 (NA00002), 0/0 (NA00003)
        // -> AC=3, AN=6; AFR only NA00003 0/0 -> AC=0, AN=2
        let info = records[0].info();
        assert_eq!(
            info.get("EUR_AC"),
            Some(Some(&Value::Array(Array::Integer(vec![Some(3)]))))
        );
        assert_eq!(info.get("EUR_AN"), Some(Some(&Value::Integer(6))));
        assert_eq!(
            info.get("EUR_AF"),
            Some(Some(&Value::Array(Array::Float(vec![Some(0.5)]))))
        );
        assert_eq!(
            info.get("AFR_AC"),
            Some(Some(&Value::Array(Array::Integer(vec![Some(0)]))))
        );
        assert_eq!(info.get("AFR_AN"), Some(Some(&Value::Integer(2))));

        // record 2: multi-allelic with a missing genotype; AFR has no called
        // alleles -> "." placeholders and AN=0
        let info = records[1].info();
        assert_eq!(
            info.get("EUR_AC"),
            Some(Some(&Value::Array(Array::Integer(vec![
                Some(2),
                Some(1)
            ]))))
        );
        assert_eq!(info.get("EUR_AN"), Some(Some(&Value::Integer(3))));
        assert_eq!(
            info.get("AFR_AC"),
            Some(Some(&Value::Array(Array::Integer(vec![None, None]))))
        );
        assert_eq!(info.get("AFR_AN"), Some(Some(&Value::Integer(0))));
        assert_eq!(
            info.get("AFR_AF"),
            Some(Some(&Value::Array(Array::Float(vec![None, None]))))
        );

        // configuration document round-trips through the summary-stats loader
        let config =
            crate::summary::populations::load_config(path_config.to_str().expect("invalid path"))?;
        let populations = config.get("homo_sapiens").expect("species entry");
        assert_eq!(populations[0].name, "1000GENOMES");
        assert_eq!(populations[0].files[0].include_fields.len(), 2);

        Ok(())
    }
}
