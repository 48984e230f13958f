//! Helpers for using noodles.

use std::io::{BufRead, Write};
use std::path::Path;

use noodles::vcf;

/// Commonly used VCF reader type, transparently handling bgzip input.
pub type VcfReader = vcf::io::Reader<Box<dyn BufRead>>;
/// Commonly used VCF writer type, transparently handling bgzip output.
pub type VcfWriter = vcf::io::Writer<Box<dyn Write>>;

/// Open a VCF file for reading, decompressing if the path looks compressed.
pub fn open_vcf_reader<P>(path: P) -> Result<VcfReader, anyhow::Error>
where
    P: AsRef<Path>,
{
    tracing::debug!("Opening {:?} for reading VCF", path.as_ref());
    vcf::io::reader::Builder::default()
        .build_from_path(path.as_ref())
        .map_err(|e| anyhow::anyhow!("problem opening VCF file {:?}: {}", path.as_ref(), e))
}

/// Open a VCF file for writing, compressing if the path looks compressed.
pub fn open_vcf_writer<P>(path: P) -> Result<VcfWriter, anyhow::Error>
where
    P: AsRef<Path>,
{
    tracing::debug!("Opening {:?} for writing VCF", path.as_ref());
    vcf::io::writer::Builder::default()
        .build_from_path(path.as_ref())
        .map_err(|e| anyhow::anyhow!("problem opening VCF file {:?}: {}", path.as_ref(), e))
}
