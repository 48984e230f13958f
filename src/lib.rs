//! vcf-prepper library main entry point.

pub mod check;
pub mod common;
pub mod freqs;
pub mod remove_variants;
pub mod summary;
pub mod update_fields;
