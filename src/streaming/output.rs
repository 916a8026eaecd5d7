//! Result table writer.
//!
//! Integers go through itoa; floats use C `%g` style formatting (six
//! significant digits) so tables stay compact and diff-stable.

use crate::error::Result;
use crate::marker::{MarkerResult, MarkerStats};
use std::io::{BufWriter, Write};

/// Buffer size for ResultWriter (1MB default).
const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Token printed for absent values.
pub const NA: &str = "NA";

/// Output column names, tab-separated.
pub const HEADER: [&str; 18] = [
    "RSID",
    "#STUDY",
    "PVALUE_FE",
    "BETA_FE",
    "STD_FE",
    "PVALUE_RE",
    "BETA_RE",
    "STD_RE",
    "PVALUE_RE2",
    "STAT1_RE2",
    "STAT2_RE2",
    "PVALUE_BE",
    "I_SQUARE",
    "Q",
    "PVALUE_Q",
    "TAU_SQUARE",
    "PVALUES_OF_STUDIES(Tab_delimitered)",
    "MVALUES_OF_STUDIES(Tab_delimitered)",
];

/// Number of statistic columns between `#STUDY` and the per-study columns.
pub const NUM_STAT_COLUMNS: usize = 14;

const SIGNIFICANT_DIGITS: i32 = 6;

/// Format a float like C's `%g`: six significant digits, trailing zeros
/// removed, scientific notation for exponents below -4 or at least 6.
/// Non-finite values print as `NA`.
pub fn format_g(value: f64) -> String {
    if !value.is_finite() {
        return NA.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    // Round to the target precision first; the exponent can shift (9.999995 -> 1e+01).
    let sci = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let decimals = (SIGNIFICANT_DIGITS - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

/// Strip trailing zeros (and a dangling point) from a decimal fraction.
fn trim_fraction(s: &str) -> &str {
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.')
}

/// Buffered writer for the result table.
pub struct ResultWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
}

impl<W: Write> ResultWriter<W> {
    pub fn new(output: W) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, output)
    }

    pub fn with_capacity(capacity: usize, output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
            itoa_buf: itoa::Buffer::new(),
        }
    }

    /// Write the header line.
    pub fn write_header(&mut self) -> Result<()> {
        self.writer.write_all(HEADER.join("\t").as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write one row.
    pub fn write_result(&mut self, result: &MarkerResult) -> Result<()> {
        self.writer.write_all(result.rsid.as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.writer
            .write_all(self.itoa_buf.format(result.num_observed).as_bytes())?;

        match &result.stats {
            Some(stats) => {
                for value in stat_columns(stats) {
                    self.write_tab()?;
                    self.write_opt(value)?;
                }
            }
            None => {
                for _ in 0..NUM_STAT_COLUMNS {
                    self.write_tab()?;
                    self.writer.write_all(NA.as_bytes())?;
                }
            }
        }

        for pvalue in &result.study_pvalues {
            self.write_tab()?;
            self.write_opt(*pvalue)?;
        }

        let mvalues = result.stats.as_ref().and_then(|s| s.mvalues.as_ref());
        for slot in 0..result.study_pvalues.len() {
            self.write_tab()?;
            let m = mvalues.and_then(|m| m.get(slot).copied().flatten());
            self.write_opt(m)?;
        }

        self.writer.write_all(b"\n")?;
        Ok(())
    }

    #[inline]
    fn write_tab(&mut self) -> Result<()> {
        self.writer.write_all(b"\t")?;
        Ok(())
    }

    #[inline]
    fn write_opt(&mut self, value: Option<f64>) -> Result<()> {
        match value {
            Some(v) => self.writer.write_all(format_g(v).as_bytes())?,
            None => self.writer.write_all(NA.as_bytes())?,
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// The 14 statistic columns in header order.
fn stat_columns(stats: &MarkerStats) -> [Option<f64>; NUM_STAT_COLUMNS] {
    let fe = &stats.fixed;
    let re = &stats.random;
    let he = &stats.han_eskin;
    [
        Some(fe.pvalue),
        Some(fe.beta),
        Some(fe.std_err),
        Some(re.pooled.pvalue),
        Some(re.pooled.beta),
        Some(re.pooled.std_err),
        Some(he.pvalue),
        Some(he.mean_effect_part),
        Some(he.heterogeneity_part),
        stats.binary_effects_pvalue,
        Some(re.i_square),
        Some(re.q),
        Some(re.pvalue_q),
        Some(re.tau_square),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::{HanEskin, PooledEstimate, RandomEffects};

    #[test]
    fn test_format_g() {
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(1.0), "1");
        assert_eq!(format_g(0.5), "0.5");
        assert_eq!(format_g(-2.25), "-2.25");
        assert_eq!(format_g(123456.0), "123456");
        assert_eq!(format_g(1234567.0), "1.23457e+06");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(3.14159265), "3.14159");
        assert_eq!(format_g(2.5e-120), "2.5e-120");
        assert_eq!(format_g(9.9999999), "10");
        assert_eq!(format_g(f64::NAN), "NA");
        assert_eq!(format_g(f64::INFINITY), "NA");
    }

    #[test]
    fn test_header() {
        let mut out = Vec::new();
        {
            let mut writer = ResultWriter::new(&mut out);
            writer.write_header().unwrap();
            writer.flush().unwrap();
        }
        let line = String::from_utf8(out).unwrap();
        assert!(line.starts_with("RSID\t#STUDY\tPVALUE_FE\t"));
        assert_eq!(line.trim_end().split('\t').count(), 18);
    }

    #[test]
    fn test_placeholder_row() {
        let result = MarkerResult {
            rsid: "rs9".to_string(),
            num_observed: 1,
            study_pvalues: vec![Some(0.5), None],
            stats: None,
        };
        let mut out = Vec::new();
        {
            let mut writer = ResultWriter::new(&mut out);
            writer.write_result(&result).unwrap();
            writer.flush().unwrap();
        }
        let line = String::from_utf8(out).unwrap();
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        assert_eq!(fields.len(), 2 + NUM_STAT_COLUMNS + 2 + 2);
        assert_eq!(fields[0], "rs9");
        assert_eq!(fields[1], "1");
        assert!(fields[2..16].iter().all(|f| *f == "NA"));
        assert_eq!(&fields[16..], &["0.5", "NA", "NA", "NA"]);
    }

    #[test]
    fn test_full_row() {
        let pooled = PooledEstimate {
            beta: 0.25,
            std_err: 0.05,
            z: 5.0,
            pvalue: 1e-6,
        };
        let stats = MarkerStats {
            fixed: pooled,
            random: RandomEffects {
                pooled,
                q: 0.5,
                pvalue_q: 0.75,
                i_square: 0.0,
                tau_square: 0.0,
            },
            han_eskin: HanEskin {
                mean_effect_part: 25.0,
                heterogeneity_part: 0.0,
                statistic: 25.0,
                pvalue: 2e-6,
            },
            binary_effects_pvalue: None,
            mvalues: Some(vec![Some(1.0), Some(0.5)]),
        };
        let result = MarkerResult {
            rsid: "rs1".to_string(),
            num_observed: 2,
            study_pvalues: vec![Some(0.001), Some(0.01)],
            stats: Some(stats),
        };
        let mut out = Vec::new();
        {
            let mut writer = ResultWriter::new(&mut out);
            writer.write_result(&result).unwrap();
            writer.flush().unwrap();
        }
        let line = String::from_utf8(out).unwrap();
        assert_eq!(
            line,
            "rs1\t2\t1e-06\t0.25\t0.05\t1e-06\t0.25\t0.05\t2e-06\t25\t0\tNA\t0\t0.5\t0.75\t0\t0.001\t0.01\t1\t0.5\n"
        );
    }
}
