//! Precomputed null-distribution table for the Han-Eskin statistic.
//!
//! The statistic's null distribution is a study-count dependent mixture with
//! no closed form, so p-values come from an empirical table loaded once at
//! startup.
//!
//! # File format
//!
//! Whitespace-delimited text; lines starting with `#` are ignored.
//!
//! ```text
//! STAT   0.0   0.1   0.2  ...
//! 2      1.0   0.93  0.88 ...
//! 3      1.0   0.94  0.89 ...
//! ```
//!
//! The first line holds a label followed by the statistic grid (strictly
//! increasing, non-negative). Each following line holds a study count and
//! one p-value per grid point. Study counts must be contiguous and ascending.

use super::chi_square_sf;
use crate::error::{MetaError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Asymptotic null tail: 50:50 mixture of chi-square(1) and chi-square(2).
pub fn asymptotic_pvalue(statistic: f64) -> f64 {
    0.5 * chi_square_sf(1.0, statistic) + 0.5 * chi_square_sf(2.0, statistic)
}

/// Immutable lookup table keyed by (study count, statistic).
#[derive(Debug, Clone, PartialEq)]
pub struct PvalueTable {
    grid: Vec<f64>,
    min_studies: usize,
    rows: Vec<Vec<f64>>,
}

impl PvalueTable {
    /// Build a table from a statistic grid and one p-value row per study count,
    /// starting at `min_studies`.
    pub fn from_parts(grid: Vec<f64>, min_studies: usize, rows: Vec<Vec<f64>>) -> Result<Self> {
        if grid.is_empty() {
            return Err(MetaError::Table("statistic grid is empty".to_string()));
        }
        if grid.iter().any(|g| !g.is_finite() || *g < 0.0) {
            return Err(MetaError::Table(
                "statistic grid values must be finite and non-negative".to_string(),
            ));
        }
        if grid.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MetaError::Table(
                "statistic grid must be strictly increasing".to_string(),
            ));
        }
        if rows.is_empty() {
            return Err(MetaError::Table("table has no study-count rows".to_string()));
        }
        for (i, row) in rows.iter().enumerate() {
            let studies = min_studies + i;
            if row.len() != grid.len() {
                return Err(MetaError::Table(format!(
                    "row for {} studies has {} p-values, expected {}",
                    studies,
                    row.len(),
                    grid.len()
                )));
            }
            if row.iter().any(|p| !(0.0..=1.0).contains(p)) {
                return Err(MetaError::Table(format!(
                    "row for {} studies has a p-value outside [0, 1]",
                    studies
                )));
            }
        }
        Ok(Self {
            grid,
            min_studies,
            rows,
        })
    }

    /// Load a table file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            MetaError::Table(format!(
                "cannot open {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a table from any buffered source.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut grid: Option<Vec<f64>> = None;
        let mut min_studies = 0;
        let mut rows = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_num = idx + 1;
            let mut tokens = line.split_whitespace();
            let first = match tokens.next() {
                Some(t) if !t.starts_with('#') => t,
                _ => continue,
            };

            let values = tokens
                .map(|t| t.parse::<f64>())
                .collect::<std::result::Result<Vec<f64>, _>>()
                .map_err(|_| MetaError::Table(format!("non-numeric value at line {}", line_num)))?;

            if grid.is_none() {
                grid = Some(values);
                continue;
            }

            let studies: usize = first.parse().map_err(|_| {
                MetaError::Table(format!(
                    "invalid study count '{}' at line {}",
                    first, line_num
                ))
            })?;
            if rows.is_empty() {
                min_studies = studies;
            } else if studies != min_studies + rows.len() {
                return Err(MetaError::Table(format!(
                    "study counts must be contiguous and ascending (got {} at line {})",
                    studies, line_num
                )));
            }
            rows.push(values);
        }

        let grid = grid.ok_or_else(|| MetaError::Table("table file is empty".to_string()))?;
        Self::from_parts(grid, min_studies, rows)
    }

    pub fn min_studies(&self) -> usize {
        self.min_studies
    }

    pub fn max_studies(&self) -> usize {
        self.min_studies + self.rows.len() - 1
    }

    /// Largest tabulated statistic.
    pub fn max_statistic(&self) -> f64 {
        self.grid[self.grid.len() - 1]
    }

    /// Interpolated p-value of `statistic` for a marker with `num_studies` studies.
    pub fn pvalue(&self, num_studies: usize, statistic: f64) -> Result<f64> {
        if num_studies < self.min_studies || num_studies > self.max_studies() {
            return Err(MetaError::Table(format!(
                "{} studies is outside the table's supported range {}..={}",
                num_studies,
                self.min_studies,
                self.max_studies()
            )));
        }
        if statistic.is_nan() {
            return Err(MetaError::Table("statistic is NaN".to_string()));
        }
        let row = &self.rows[num_studies - self.min_studies];

        if statistic <= self.grid[0] {
            return Ok(row[0]);
        }

        let last = self.grid.len() - 1;
        if statistic >= self.grid[last] {
            if statistic.is_infinite() {
                return Ok(0.0);
            }
            // Extrapolate the asymptotic tail, anchored at the last tabulated point.
            let anchor = asymptotic_pvalue(self.grid[last]);
            if anchor <= 0.0 {
                return Ok(row[last]);
            }
            return Ok((asymptotic_pvalue(statistic) * row[last] / anchor).min(1.0));
        }

        let hi = self.grid.partition_point(|&g| g <= statistic);
        let lo = hi - 1;
        let t = (statistic - self.grid[lo]) / (self.grid[hi] - self.grid[lo]);
        Ok(row[lo] + t * (row[hi] - row[lo]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
# test table
STAT 0.0 1.0 2.0 4.0
2 1.0 0.6 0.3 0.1
3 1.0 0.7 0.4 0.2
";

    fn table() -> PvalueTable {
        PvalueTable::from_reader(TABLE.as_bytes()).unwrap()
    }

    #[test]
    fn test_load() {
        let t = table();
        assert_eq!(t.min_studies(), 2);
        assert_eq!(t.max_studies(), 3);
        assert_eq!(t.max_statistic(), 4.0);
    }

    #[test]
    fn test_exact_grid_points_and_interpolation() {
        let t = table();
        assert_eq!(t.pvalue(2, 0.0).unwrap(), 1.0);
        assert_eq!(t.pvalue(2, 1.0).unwrap(), 0.6);
        assert!((t.pvalue(2, 1.5).unwrap() - 0.45).abs() < 1e-12);
        assert!((t.pvalue(3, 3.0).unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_below_grid_clamps() {
        assert_eq!(table().pvalue(3, -1.0).unwrap(), 1.0);
    }

    #[test]
    fn test_tail_extrapolation_is_anchored_and_decreasing() {
        let t = table();
        let at_last = t.pvalue(2, 4.0).unwrap();
        assert!((at_last - 0.1).abs() < 1e-12);
        let beyond = t.pvalue(2, 10.0).unwrap();
        let far = t.pvalue(2, 40.0).unwrap();
        assert!(beyond < at_last);
        assert!(far < beyond);
        assert!(far > 0.0);
        assert_eq!(t.pvalue(2, f64::INFINITY).unwrap(), 0.0);
    }

    #[test]
    fn test_study_count_out_of_range_is_error() {
        let t = table();
        assert!(t.pvalue(1, 1.0).is_err());
        assert!(t.pvalue(4, 1.0).is_err());
        assert!(t.pvalue(2, f64::NAN).is_err());
    }

    #[test]
    fn test_malformed_tables_rejected() {
        assert!(PvalueTable::from_reader("".as_bytes()).is_err());
        assert!(PvalueTable::from_reader("S 0 1\n".as_bytes()).is_err());
        assert!(PvalueTable::from_reader("S 0 1\n2 1.0\n".as_bytes()).is_err());
        assert!(PvalueTable::from_reader("S 1 0\n2 1.0 0.5\n".as_bytes()).is_err());
        assert!(PvalueTable::from_reader("S 0 1\n2 1.0 0.5\n4 1.0 0.5\n".as_bytes()).is_err());
        assert!(PvalueTable::from_reader("S 0 1\n2 1.0 x\n".as_bytes()).is_err());
        assert!(PvalueTable::from_reader("S 0 1\n2 1.0 1.5\n".as_bytes()).is_err());
    }

    #[test]
    fn test_asymptotic_pvalue() {
        assert!((asymptotic_pvalue(0.0) - 1.0).abs() < 1e-12);
        assert!(asymptotic_pvalue(10.0) < asymptotic_pvalue(5.0));
    }
}
