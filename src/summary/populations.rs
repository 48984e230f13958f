//! Population/frequency source configuration.
//!
//! The configuration document is JSON keyed by species production name; each
//! entry lists populations with their frequency files and the INFO/CSQ field
//! names (`af`, or `ac` plus `an`) that carry the population's numbers.

use indexmap::IndexMap;

use super::csq::CsqFormat;

/// Field name mapping of one population within a frequency file.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct FieldNames {
    /// Name of the allele frequency field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub af: Option<String>,
    /// Name of the allele count field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ac: Option<String>,
    /// Name of the total allele number field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub an: Option<String>,
}

/// One population entry within a frequency file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IncludeField {
    /// Population name.
    pub name: String,
    /// Field name mapping for the population.
    pub fields: FieldNames,
}

/// One frequency file of a population.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PopulationFile {
    /// Location of the frequency file.
    pub file_location: String,
    /// Short display name.
    pub short_name: String,
    /// Populations carried by the file.
    #[serde(default)]
    pub include_fields: Vec<IncludeField>,
}

/// A population group of a species.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Population {
    /// Name of the population group.
    pub name: String,
    /// Frequency files of the group.
    #[serde(default)]
    pub files: Vec<PopulationFile>,
}

/// Full configuration document, keyed by species production name.
pub type PopulationConfig = IndexMap<String, Vec<Population>>;

/// Load a population configuration document from a JSON file.
pub fn load_config(path: &str) -> Result<PopulationConfig, anyhow::Error> {
    let reader = crate::common::io::open_read_maybe_gz(path)?;
    serde_json::from_reader(reader)
        .map_err(|e| anyhow::anyhow!("problem parsing population configuration {}: {}", path, e))
}

/// The representative frequency source resolved for one species.
#[derive(Debug, Clone, Default)]
pub struct FrequencySource {
    /// Display name, appended to the RAF header description.
    pub display_name: String,
    /// CSQ field names carrying a precomputed allele frequency.
    pub af_fields: Vec<String>,
    /// CSQ field name pairs carrying allele count and total allele number.
    pub ac_an_fields: Vec<(String, String)>,
}

impl FrequencySource {
    /// Resolve the frequency source for `species`.
    ///
    /// With a configuration file, the species entry is looked up by exact key
    /// first, then by key prefix (configuration keys may name a species
    /// group).  Without one, the built-in defaults apply.
    pub fn for_species(
        species: &str,
        config_path: Option<&str>,
    ) -> Result<Option<Self>, anyhow::Error> {
        let Some(config_path) = config_path else {
            return Ok(Self::builtin(species));
        };

        let config = load_config(config_path)?;
        let populations = match config.get(species) {
            Some(populations) => populations,
            None => match config
                .iter()
                .find(|(key, _)| species.starts_with(key.as_str()))
            {
                Some((_, populations)) => populations,
                None => return Ok(None),
            },
        };

        let mut result = Self::default();
        let mut names = Vec::new();
        for population in populations {
            names.push(population.name.clone());
            for file in &population.files {
                for include_field in &file.include_fields {
                    let fields = &include_field.fields;
                    if let Some(af) = &fields.af {
                        result.af_fields.push(af.clone());
                    }
                    match (&fields.ac, &fields.an) {
                        (Some(ac), Some(an)) => {
                            result.ac_an_fields.push((ac.clone(), an.clone()))
                        }
                        (None, None) => (),
                        _ => anyhow::bail!(
                            "population {:?} of species {:?} defines only one of ac/an",
                            include_field.name,
                            species
                        ),
                    }
                }
            }
        }

        if result.af_fields.is_empty() && result.ac_an_fields.is_empty() {
            Ok(None)
        } else {
            result.display_name = names.join(", ");
            Ok(Some(result))
        }
    }

    /// Built-in defaults for species without a configuration file.
    fn builtin(species: &str) -> Option<Self> {
        let (af_field, display_name) = match species {
            "homo_sapiens" => ("gnomAD_genomes_AF", "gnomAD genomes v3.1.2"),
            "homo_sapiens_37" => ("gnomAD_exomes_AF", "gnomAD exomes v2.1.1"),
            _ => return None,
        };

        Some(Self {
            display_name: display_name.to_string(),
            af_fields: vec![af_field.to_string()],
            ac_an_fields: Vec::new(),
        })
    }

    /// Extract the representative frequency from the split `values` of one
    /// CSQ entry.
    ///
    /// More than one configured source carrying a value at the same time is a
    /// configuration error; a single value that does not parse as a number is
    /// treated as absent.
    pub fn representative_frequency(
        &self,
        format: &CsqFormat,
        values: &[&str],
    ) -> Result<Option<f32>, anyhow::Error> {
        let mut present: Vec<(String, Option<f32>)> = Vec::new();

        for af_field in &self.af_fields {
            if let Some(value) = format.field(values, af_field) {
                if !value.is_empty() {
                    present.push((af_field.clone(), value.parse::<f32>().ok()));
                }
            }
        }

        for (ac_field, an_field) in &self.ac_an_fields {
            let ac = format.field(values, ac_field).unwrap_or("");
            let an = format.field(values, an_field).unwrap_or("");
            if !ac.is_empty() && !an.is_empty() {
                let frequency = match (ac.parse::<f32>(), an.parse::<f32>()) {
                    (Ok(ac), Ok(an)) if an > 0.0 => Some(ac / an),
                    _ => None,
                };
                present.push((format!("{}/{}", ac_field, an_field), frequency));
            }
        }

        match present.len() {
            0 => Ok(None),
            1 => Ok(present.remove(0).1),
            _ => anyhow::bail!(
                "more than one configured frequency source carries a value: {}",
                present
                    .iter()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}
