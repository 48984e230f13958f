//! Per-variant aggregation of CSQ annotation entries.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::csq::CsqFormat;
use super::populations::FrequencySource;

/// Consequence terms that do not count towards any feature.
pub const SKIP_CONSEQUENCE: &[&str] = &[
    "downstream_gene_variant",
    "upstream_gene_variant",
    "intergenic_variant",
    "TF_binding_site_variant",
    "TFBS_ablation",
    "TFBS_amplification",
];

/// Aggregation buckets for a single alternate allele.
#[derive(Debug, Default)]
pub struct AlleleSummary {
    /// Distinct `feature:consequences` tags on transcripts.
    pub transcript_consequences: HashSet<String>,
    /// Distinct `feature:consequences` tags on regulatory features.
    pub regulatory_consequences: HashSet<String>,
    /// Distinct overlapped gene identifiers.
    pub genes: HashSet<String>,
    /// Distinct phenotypes linked to the variant itself.
    pub variant_phenotypes: HashSet<String>,
    /// Distinct phenotypes linked through a gene.
    pub gene_phenotypes: HashSet<String>,
    /// Representative allele frequency, last non-empty value wins.
    pub frequency: Option<f32>,
}

/// Aggregation state over all CSQ entries of one record.
#[derive(Debug, Default)]
pub struct VariantSummary {
    /// Buckets keyed by the allele string of the CSQ entry.
    per_allele: IndexMap<String, AlleleSummary>,
    /// Distinct citation identifiers, variant-level.
    citations: HashSet<String>,
}

/// Computed per-record summary values, ready for INFO emission.
#[derive(Debug, Default, PartialEq)]
pub struct SummaryValues {
    /// Per-allele transcript consequence counts.
    pub ntcsq: Vec<Option<i32>>,
    /// Per-allele regulatory consequence counts.
    pub nrcsq: Vec<Option<i32>>,
    /// Per-allele gene counts.
    pub ngene: Vec<Option<i32>>,
    /// Per-allele variant-linked phenotype counts.
    pub nvphn: Vec<Option<i32>>,
    /// Per-allele gene-linked phenotype counts.
    pub ngphn: Vec<Option<i32>>,
    /// Per-allele representative frequencies.
    pub raf: Vec<Option<f32>>,
    /// Variant-level citation count.
    pub ncite: Option<i32>,
}

impl VariantSummary {
    /// Fold one CSQ entry into the summary.
    ///
    /// Malformed content degrades to absent counts; only an ambiguous
    /// frequency source configuration is an error.
    pub fn ingest_entry(
        &mut self,
        format: &CsqFormat,
        entry: &str,
        frequency: Option<&FrequencySource>,
    ) -> Result<(), anyhow::Error> {
        let values: Vec<&str> = entry.split('|').collect();

        let allele = format.field(&values, "Allele").unwrap_or("");
        let bucket = self.per_allele.entry(allele.to_string()).or_default();

        let consequences = format.field(&values, "Consequence").unwrap_or("");
        let feature = format.field(&values, "Feature").unwrap_or("");

        // A feature only counts when at least one of its consequence terms
        // is neither trivial nor empty.
        let mut add_regulatory_feature = false;
        let mut add_transcript_feature = false;
        for term in consequences.split('&') {
            if term.is_empty() || SKIP_CONSEQUENCE.contains(&term) {
                continue;
            }
            if term.starts_with("regulatory") {
                add_regulatory_feature = true;
            } else {
                add_transcript_feature = true;
            }
        }

        if add_transcript_feature {
            if let Some(gene) = format.field(&values, "Gene") {
                if !gene.is_empty() {
                    bucket.genes.insert(gene.to_string());
                }
            }
            bucket
                .transcript_consequences
                .insert(format!("{}:{}", feature, consequences));
        }

        if add_regulatory_feature {
            bucket
                .regulatory_consequences
                .insert(format!("{}:{}", feature, consequences));
        }

        if let Some(phenotypes) = format.field(&values, "PHENOTYPES") {
            for phenotype in phenotypes.split('&') {
                let parts: Vec<&str> = phenotype.split('+').collect();
                if parts.len() != 3 {
                    continue;
                }
                let (name, source, feature) = (parts[0], parts[1], parts[2]);
                let tag = format!("{}:{}:{}", name, source, feature);
                if feature.starts_with("ENS") {
                    bucket.gene_phenotypes.insert(tag);
                } else {
                    bucket.variant_phenotypes.insert(tag);
                }
            }
        }

        if let Some(citations) = format.field(&values, "PUBMED") {
            for citation in citations.split('&') {
                if !citation.is_empty() {
                    self.citations.insert(citation.to_string());
                }
            }
        }

        if let Some(frequency) = frequency {
            if let Some(value) = frequency.representative_frequency(format, &values)? {
                bucket.frequency = Some(value);
            }
        }

        Ok(())
    }

    /// Project the buckets onto the minimised allele order of the record.
    ///
    /// Zero counts become absent positions; alleles without a bucket stay
    /// absent throughout.
    pub fn summarize(&self, allele_order: &[String]) -> SummaryValues {
        let count = |f: fn(&AlleleSummary) -> &HashSet<String>| -> Vec<Option<i32>> {
            allele_order
                .iter()
                .map(|allele| {
                    self.per_allele
                        .get(allele)
                        .map(|bucket| f(bucket).len() as i32)
                        .filter(|len| *len > 0)
                })
                .collect()
        };

        SummaryValues {
            ntcsq: count(|bucket| &bucket.transcript_consequences),
            nrcsq: count(|bucket| &bucket.regulatory_consequences),
            ngene: count(|bucket| &bucket.genes),
            nvphn: count(|bucket| &bucket.variant_phenotypes),
            ngphn: count(|bucket| &bucket.gene_phenotypes),
            raf: allele_order
                .iter()
                .map(|allele| self.per_allele.get(allele).and_then(|bucket| bucket.frequency))
                .collect(),
            ncite: match self.citations.len() {
                0 => None,
                len => Some(len as i32),
            },
        }
    }
}
