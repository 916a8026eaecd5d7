//! Per-marker statistical engine.
//!
//! Estimators run in a fixed order for every analyzed marker:
//! fixed effects, random effects, Han-Eskin, then (conditionally) binary
//! effects and m-values. Genomic-control calibration runs once after the pass.

pub mod binary;
pub mod fixed;
pub mod han_eskin;
pub mod lambda;
pub mod mvalue;
pub mod pvalue_table;
pub mod random;

pub use binary::BinaryEffectsEstimator;
pub use fixed::fixed_effects;
pub use han_eskin::han_eskin;
pub use lambda::{CalibrationAccumulator, InflationFactors};
pub use mvalue::{MvalueEstimator, MvaluePrior};
pub use pvalue_table::PvalueTable;
pub use random::random_effects;

use statrs::function::erf::{erfc, erfc_inv};
use statrs::function::gamma::gamma_ur;
use std::f64::consts::SQRT_2;

/// Two-sided standard-normal p-value of a z score.
#[inline]
pub fn two_sided_normal_pvalue(z: f64) -> f64 {
    erfc(z.abs() / SQRT_2)
}

/// Standard-normal quantile function.
#[inline]
pub fn normal_quantile(p: f64) -> f64 {
    -SQRT_2 * erfc_inv(2.0 * p)
}

/// Upper tail of the chi-square distribution with `df` degrees of freedom.
#[inline]
pub fn chi_square_sf(df: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    gamma_ur(df / 2.0, x / 2.0)
}

/// Median of chi-square(1): the squared normal quantile at 0.25.
pub fn chi_square_one_median() -> f64 {
    normal_quantile(0.25).powi(2)
}
