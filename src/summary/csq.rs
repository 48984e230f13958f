//! Access to VEP `CSQ` annotation entries by field name.

use indexmap::IndexMap;
use noodles::vcf::{
    self,
    variant::record_buf::{
        info::field::{value::Array, Value},
        RecordBuf,
    },
};

/// Field layout of the `CSQ` INFO entries, parsed once per file from the
/// `Format: A|B|C` suffix of the header description.
#[derive(Debug, Clone)]
pub struct CsqFormat {
    /// Mapping from field name to zero-based position within an entry.
    fields: IndexMap<String, usize>,
}

impl CsqFormat {
    /// Parse the format from the `CSQ` INFO definition of `header`.
    ///
    /// A missing `CSQ` definition or a description without a `Format:` part
    /// is an error as no entry can be interpreted without it.
    pub fn from_header(header: &vcf::Header) -> Result<Self, anyhow::Error> {
        let csq = header
            .infos()
            .get("CSQ")
            .ok_or_else(|| anyhow::anyhow!("input file has no INFO/CSQ header definition"))?;
        Self::from_description(csq.description())
    }

    /// Parse the format from an INFO description string.
    pub fn from_description(description: &str) -> Result<Self, anyhow::Error> {
        let (_, names) = description.split_once("Format: ").ok_or_else(|| {
            anyhow::anyhow!(
                "INFO/CSQ description carries no field format: {:?}",
                description
            )
        })?;

        Ok(Self {
            fields: names
                .trim_end_matches('"')
                .split('|')
                .enumerate()
                .map(|(idx, name)| (name.trim().to_string(), idx))
                .collect(),
        })
    }

    /// Return the zero-based position of the field `name`, if declared.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.get(name).copied()
    }

    /// Look up the field `name` within the split `values` of one entry.
    ///
    /// Returns `None` for a field that the header does not declare and an
    /// empty string for entries shorter than the declared format.
    pub fn field<'a>(&self, values: &[&'a str], name: &str) -> Option<&'a str> {
        self.field_index(name)
            .map(|idx| values.get(idx).copied().unwrap_or(""))
    }
}

/// Extract the raw `CSQ` entries of `record`, one string per entry.
///
/// Records without a `CSQ` INFO field yield an empty list.
pub fn csq_entries(record: &RecordBuf) -> Vec<String> {
    match record.info().get("CSQ") {
        Some(Some(Value::Array(Array::String(values)))) => {
            values.iter().flatten().cloned().collect()
        }
        Some(Some(Value::String(value))) => value.split(',').map(String::from).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::CsqFormat;

    static DESCRIPTION: &str =
        "Consequence annotations from Ensembl VEP. Format: Allele|Consequence|Feature|Gene";

    #[test]
    fn from_description() -> Result<(), anyhow::Error> {
        let format = CsqFormat::from_description(DESCRIPTION)?;

        assert_eq!(format.field_index("Allele"), Some(0));
        assert_eq!(format.field_index("Consequence"), Some(1));
        assert_eq!(format.field_index("Gene"), Some(3));
        assert_eq!(format.field_index("PHENOTYPES"), None);

        Ok(())
    }

    #[test]
    fn from_description_without_format_part() {
        assert!(CsqFormat::from_description("Consequence annotations from Ensembl VEP").is_err());
    }

    #[test]
    fn field_lookup() -> Result<(), anyhow::Error> {
        let format = CsqFormat::from_description(DESCRIPTION)?;
        let values = vec!["T", "missense_variant"];

        assert_eq!(format.field(&values, "Allele"), Some("T"));
        assert_eq!(format.field(&values, "Consequence"), Some("missense_variant"));
        // declared but the entry is shorter than the format
        assert_eq!(format.field(&values, "Gene"), Some(""));
        // not declared at all
        assert_eq!(format.field(&values, "PUBMED"), None);

        Ok(())
    }
}
