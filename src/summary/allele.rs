//! Minimisation of alternate alleles into the VEP allele notation.

/// Minimise a single alternate allele against the reference allele.
///
/// When reference and alternate share their leading base, the shared base is
/// stripped from the alternate; an alternate that would become empty is
/// written as `-`.  Spanning deletion markers (`*`) are kept as they are.
pub fn minimise_allele(reference: &str, alt: &str) -> String {
    if alt.contains('*') {
        return alt.to_string();
    }

    match (reference.chars().next(), alt.chars().next()) {
        (Some(r), Some(a)) if r == a => {
            if alt.len() > 1 {
                alt[1..].to_string()
            } else {
                String::from("-")
            }
        }
        _ => alt.to_string(),
    }
}

/// Minimise all alternate alleles of a record, keeping the input order.
pub fn minimise_alleles(reference: &str, alts: &[String]) -> Vec<String> {
    alts.iter()
        .map(|alt| minimise_allele(reference, alt))
        .collect()
}
