//! Han-Eskin random-effects statistic (RE2).
//!
//! The likelihood-ratio statistic for "no effect and no heterogeneity" is
//! split into a mean-effect part (the squared fixed-effects z score) and a
//! heterogeneity part (the remaining likelihood gain from allowing
//! between-study variance). Each part is divided by its genomic-control
//! lambda before the parts are summed and looked up in the p-value table.

use super::pvalue_table::PvalueTable;
use crate::error::Result;
use crate::marker::{HanEskin, PooledEstimate, StudyData};

const MAX_ITERATIONS: usize = 10_000;
const LOG_LIKELIHOOD_TOLERANCE: f64 = 1e-10;
/// Heterogeneity gains below this are rounding noise and reported as 0.
pub const HETEROGENEITY_TOLERANCE: f64 = 1e-8;

/// Normal log-likelihood (up to a constant) under mean `mu` and extra variance `tau2`.
fn log_likelihood(effects: &[f64], variances: &[f64], mu: f64, tau2: f64) -> f64 {
    effects
        .iter()
        .zip(variances)
        .map(|(b, v)| {
            let total = v + tau2;
            -0.5 * (total.ln() + (b - mu).powi(2) / total)
        })
        .sum()
}

/// Maximize the log-likelihood over (mu, tau2 >= 0) by fixed-point iteration,
/// starting from the fixed-effects estimate.
///
/// Returns the best log-likelihood visited and the tau2 it was reached at.
/// The starting point (`mu_start`, 0) counts as visited.
fn maximize_log_likelihood(
    effects: &[f64],
    variances: &[f64],
    mu_start: f64,
    tau2_start: f64,
) -> (f64, f64) {
    let mut best = log_likelihood(effects, variances, mu_start, 0.0);
    let mut best_tau2 = 0.0;
    let mut tau2 = tau2_start.max(0.0);
    let mut previous = f64::NEG_INFINITY;

    for _ in 0..MAX_ITERATIONS {
        let weights: Vec<f64> = variances.iter().map(|v| 1.0 / (v + tau2)).collect();
        let sum_w: f64 = weights.iter().sum();
        let mu = effects.iter().zip(&weights).map(|(b, w)| w * b).sum::<f64>() / sum_w;

        let sum_w2: f64 = weights.iter().map(|w| w * w).sum();
        let numerator: f64 = effects
            .iter()
            .zip(variances)
            .zip(&weights)
            .map(|((b, v), w)| w * w * ((b - mu).powi(2) - v))
            .sum();
        tau2 = (numerator / sum_w2).max(0.0);

        let current = log_likelihood(effects, variances, mu, tau2);
        if current.is_finite() && current > best {
            best = current;
            best_tau2 = tau2;
        }
        if (current - previous).abs() < LOG_LIKELIHOOD_TOLERANCE {
            break;
        }
        previous = current;
    }

    (best, best_tau2)
}

/// Compute the Han-Eskin statistic and its tabulated p-value.
///
/// `lambda_mean` and `lambda_hetero` are the inflation factors from a
/// previous run (1.0 when uncalibrated).
pub fn han_eskin(
    data: &StudyData,
    fixed: &PooledEstimate,
    tau_square: f64,
    lambda_mean: f64,
    lambda_hetero: f64,
    table: &PvalueTable,
) -> Result<HanEskin> {
    let variances = data.variances();

    // 2(ll(mu_FE, 0) - ll(0, 0)) is exactly z^2, so the heterogeneity part is
    // the gain over the fixed-effects fit rather than a difference against z^2.
    let mean_effect = fixed.z * fixed.z;
    let fixed_fit = log_likelihood(&data.effects, &variances, fixed.beta, 0.0);
    let (alternative, alternative_tau2) =
        maximize_log_likelihood(&data.effects, &variances, fixed.beta, tau_square);
    let gain = 2.0 * (alternative - fixed_fit);
    let heterogeneity = if alternative_tau2 == 0.0 || gain < HETEROGENEITY_TOLERANCE {
        0.0
    } else {
        gain
    };

    let mean_effect_part = mean_effect / lambda_mean;
    let heterogeneity_part = heterogeneity / lambda_hetero;
    let statistic = mean_effect_part + heterogeneity_part;
    let pvalue = table.pvalue(data.len(), statistic)?;

    Ok(HanEskin {
        mean_effect_part,
        heterogeneity_part,
        statistic,
        pvalue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{fixed_effects, random_effects};

    fn data(effects: &[f64], std_errs: &[f64]) -> StudyData {
        StudyData {
            effects: effects.to_vec(),
            std_errs: std_errs.to_vec(),
            slots: (0..effects.len()).collect(),
        }
    }

    fn table() -> PvalueTable {
        let grid: Vec<f64> = (0..=100).map(|i| i as f64 * 0.5).collect();
        let row: Vec<f64> = grid
            .iter()
            .map(|&s| super::super::pvalue_table::asymptotic_pvalue(s))
            .collect();
        PvalueTable::from_parts(grid, 2, vec![row; 9]).unwrap()
    }

    fn run(d: &StudyData, lm: f64, lh: f64) -> HanEskin {
        let fe = fixed_effects(d);
        let re = random_effects(d, &fe);
        han_eskin(d, &fe, re.tau_square, lm, lh, &table()).unwrap()
    }

    #[test]
    fn test_homogeneous_has_no_heterogeneity_part() {
        let d = data(&[0.3, 0.3, 0.3], &[0.1, 0.1, 0.1]);
        let he = run(&d, 1.0, 1.0);
        let fe = fixed_effects(&d);
        assert_eq!(he.heterogeneity_part, 0.0);
        assert!((he.mean_effect_part - fe.z * fe.z).abs() < 1e-9);
        assert!((he.statistic - he.mean_effect_part - he.heterogeneity_part).abs() < 1e-12);
    }

    #[test]
    fn test_opposite_effects_are_heterogeneous() {
        let d = data(&[0.5, -0.5, 0.6, -0.6], &[0.1, 0.1, 0.1, 0.1]);
        let he = run(&d, 1.0, 1.0);
        assert!(he.mean_effect_part < 1.0);
        assert!(he.heterogeneity_part > 10.0);
        assert!(he.pvalue < 0.01);
    }

    #[test]
    fn test_lambdas_scale_parts() {
        let d = data(&[0.5, -0.2, 0.6, 0.1], &[0.1, 0.15, 0.1, 0.2]);
        let base = run(&d, 1.0, 1.0);
        let scaled = run(&d, 2.0, 4.0);
        assert!((scaled.mean_effect_part - base.mean_effect_part / 2.0).abs() < 1e-9);
        assert!((scaled.heterogeneity_part - base.heterogeneity_part / 4.0).abs() < 1e-9);
        assert!(scaled.pvalue >= base.pvalue);
    }

    #[test]
    fn test_statistic_at_least_fixed_effects_chi_square() {
        let d = data(&[0.2, 0.25, 0.18], &[0.05, 0.08, 0.06]);
        let fe = fixed_effects(&d);
        let he = run(&d, 1.0, 1.0);
        assert!(he.statistic >= fe.z * fe.z - 1e-9);
    }

    #[test]
    fn test_null_heterogeneity_part_is_zero_or_clearly_positive() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};
        use rand_distr::StandardNormal;

        let mut rng = SmallRng::seed_from_u64(11);
        let mut zeros = 0;
        for _ in 0..2_000 {
            let std_errs = [0.1, 0.1, 0.1];
            let effects: Vec<f64> = std_errs
                .iter()
                .map(|se| se * rng.sample::<f64, _>(StandardNormal))
                .collect();
            let he = run(&data(&effects, &std_errs), 1.0, 1.0);
            assert!(
                he.heterogeneity_part == 0.0 || he.heterogeneity_part >= HETEROGENEITY_TOLERANCE,
                "heterogeneity part {} is rounding noise",
                he.heterogeneity_part
            );
            if he.heterogeneity_part == 0.0 {
                zeros += 1;
            }
        }
        // With three equal errors tau2 stays at 0 unless Q > 3, about 78% of nulls.
        assert!((1_400..=1_700).contains(&zeros), "zeros = {}", zeros);
    }

    #[test]
    fn test_equal_effects_with_unequal_errors_have_no_heterogeneity_part() {
        let d = data(&[0.12, 0.12, 0.12, 0.12], &[0.05, 0.3, 0.11, 0.07]);
        assert_eq!(run(&d, 1.0, 1.0).heterogeneity_part, 0.0);
    }

    #[test]
    fn test_too_many_studies_for_table_is_error() {
        let n = 12;
        let d = data(&vec![0.1; n], &vec![0.1; n]);
        let fe = fixed_effects(&d);
        assert!(han_eskin(&d, &fe, 0.0, 1.0, 1.0, &table()).is_err());
    }
}
