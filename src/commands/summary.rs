//! End-of-run log file.
//!
//! The log holds only run inputs and results (no timings), so identical
//! runs produce identical logs.

use super::meta::MetaAnalysisStats;
use crate::config::MetaConfig;
use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};

/// Printed for an inflation factor with no recorded values.
const UNCOMPUTED_LAMBDA: f64 = 0.0;

fn format_lambda(value: Option<f64>) -> String {
    format!("{:.6}", value.unwrap_or(UNCOMPUTED_LAMBDA))
}

/// Write the run summary.
pub fn write_summary<W: Write>(
    config: &MetaConfig,
    stats: &MetaAnalysisStats,
    out: &mut W,
) -> Result<()> {
    writeln!(out, "Arguments: {}", config.summary())?;
    writeln!(out, "Input File: {}", config.input.display())?;
    writeln!(out, "Output File: {}", config.output.display())?;
    writeln!(out, "Log File: {}", config.log.display())?;
    writeln!(out, "p-value Table File: {}", config.pvalue_table.display())?;
    writeln!(out, "Number of SNPs analyzed: {}", stats.markers_analyzed)?;
    writeln!(out, "Maximum number of studies: {}", stats.max_num_studies)?;
    writeln!(
        out,
        "Specified lambda for   mean effect part (default = 1.0): {:.6}",
        config.lambda_mean
    )?;
    writeln!(
        out,
        "Specified lambda for heterogeneity part (default = 1.0): {:.6}",
        config.lambda_hetero
    )?;
    writeln!(
        out,
        "Newly calculated inflation factor lambda for   mean effect part: {}",
        format_lambda(stats.inflation.mean_effect)
    )?;
    writeln!(
        out,
        "Newly calculated inflation factor lambda for heterogeneity part: {}",
        format_lambda(stats.inflation.heterogeneity)
    )?;
    Ok(())
}

/// Write the run summary to the configured log path.
pub fn write_log_file(config: &MetaConfig, stats: &MetaAnalysisStats) -> Result<()> {
    let mut out = BufWriter::new(File::create(&config.log)?);
    write_summary(config, stats, &mut out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::InflationFactors;

    #[test]
    fn test_summary_lines() {
        let config = MetaConfig {
            input: "markers.txt".into(),
            lambda_mean: 1.1,
            ..MetaConfig::default()
        };
        let stats = MetaAnalysisStats {
            markers_analyzed: 12,
            max_num_studies: 4,
            inflation: InflationFactors {
                mean_effect: Some(1.05),
                heterogeneity: None,
            },
            ..MetaAnalysisStats::default()
        };

        let mut out = Vec::new();
        write_summary(&config, &stats, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 11);
        assert!(lines[0].starts_with("Arguments: --input markers.txt"));
        assert_eq!(lines[1], "Input File: markers.txt");
        assert_eq!(lines[5], "Number of SNPs analyzed: 12");
        assert_eq!(lines[6], "Maximum number of studies: 4");
        assert!(lines[7].ends_with(": 1.100000"));
        assert!(lines[9].ends_with("mean effect part: 1.050000"));
        assert!(lines[10].ends_with("heterogeneity part: 0.000000"));
    }

    #[test]
    fn test_empty_run_prints_zero_lambdas() {
        let config = MetaConfig {
            input: "empty.txt".into(),
            ..MetaConfig::default()
        };
        let mut out = Vec::new();
        write_summary(&config, &MetaAnalysisStats::default(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[5], "Number of SNPs analyzed: 0");
        assert!(lines[9].ends_with("mean effect part: 0.000000"));
        assert!(lines[10].ends_with("heterogeneity part: 0.000000"));
    }
}
