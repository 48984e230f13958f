//! Commonly used code.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub mod io;
pub mod noodles;

/// Commonly used command line arguments.
#[derive(Parser, Debug, Default)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

/// Derive an output path from `input` by prepending `prefix` to the file name.
///
/// The directory part of `input` is preserved.
pub fn prefixed_output_path(input: &str, prefix: &str) -> String {
    let path = std::path::Path::new(input);
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| input.to_string());
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent
            .join(format!("{}{}", prefix, file_name))
            .to_string_lossy()
            .to_string(),
        _ => format!("{}{}", prefix, file_name),
    }
}

/// Derive an output path from `input` by replacing `from` in the file name with `to`.
///
/// Falls back to prepending `fallback_prefix` when the file name does not contain `from`.
pub fn replaced_output_path(input: &str, from: &str, to: &str, fallback_prefix: &str) -> String {
    let path = std::path::Path::new(input);
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| input.to_string());
    let new_name = if file_name.contains(from) {
        file_name.replacen(from, to, 1)
    } else {
        format!("{}{}", fallback_prefix, file_name)
    };
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            parent.join(new_name).to_string_lossy().to_string()
        }
        _ => new_name,
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    #[rstest::rstest]
    #[case("input.vcf.gz", "summary_stats_", "summary_stats_input.vcf.gz")]
    #[case("a/b/input.vcf", "summary_stats_", "a/b/summary_stats_input.vcf")]
    fn prefixed_output_path(#[case] input: &str, #[case] prefix: &str, #[case] expected: &str) {
        assert_eq!(super::prefixed_output_path(input, prefix), expected);
    }

    #[rstest::rstest]
    #[case("x_renamed.vcf.gz", "renamed", "processed", "x_processed.vcf.gz")]
    #[case("d/x.vcf.gz", "renamed", "processed", "d/processed_x.vcf.gz")]
    fn replaced_output_path(
        #[case] input: &str,
        #[case] from: &str,
        #[case] to: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(
            super::replaced_output_path(input, from, to, "processed_"),
            expected
        );
    }
}
