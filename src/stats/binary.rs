//! Binary-effects test with an adaptive two-stage Monte Carlo p-value.
//!
//! The statistic weights each study's z score by its m-value, so studies
//! that look null contribute little:
//!
//! ```text
//! S = |sum m_i beta_i / V_i| / sqrt(sum m_i^2 / V_i)
//! ```
//!
//! Its null distribution depends on the data through the m-values, so the
//! p-value is simulated. A small first stage screens out clearly
//! non-significant markers; only markers at or below the threshold pay for
//! the large second stage.

use super::mvalue::{exact_mvalues, MvaluePrior, PatternModel};
use crate::config::MetaConfig;
use crate::marker::StudyData;
use crate::seed::{RandomStream, SeedSlot};
use rand::Rng;
use rand_distr::StandardNormal;

/// Two-stage binary-effects p-value estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryEffectsEstimator {
    pub prior: MvaluePrior,
    /// Every null replicate enumerates 2^k patterns, so the study count is bounded.
    pub max_studies: usize,
    pub small_sample: u64,
    pub large_sample: u64,
    pub threshold: f64,
}

impl BinaryEffectsEstimator {
    pub fn from_config(config: &MetaConfig) -> Self {
        Self {
            prior: MvaluePrior::from_config(config),
            max_studies: config.binary_effects_max_studies,
            small_sample: config.binary_effects_sample,
            large_sample: config.binary_effects_large_sample,
            threshold: config.binary_effects_p_threshold,
        }
    }

    /// Binary-effects statistic of the given effects.
    pub fn statistic(&self, effects: &[f64], std_errs: &[f64]) -> f64 {
        let model = PatternModel::new(effects, std_errs, &self.prior);
        let mvalues = exact_mvalues(&model);

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for ((m, b), s) in mvalues.iter().zip(effects).zip(std_errs) {
            let precision = 1.0 / (s * s);
            numerator += m * b * precision;
            denominator += m * m * precision;
        }
        if denominator <= 0.0 {
            return 0.0;
        }
        numerator.abs() / denominator.sqrt()
    }

    /// Fraction of `num_samples` null replicates whose statistic is at least `observed`.
    ///
    /// Null effects are drawn as `se_i * N(0, 1)`.
    pub fn simulate_pvalue<R: Rng + ?Sized>(
        &self,
        std_errs: &[f64],
        observed: f64,
        num_samples: u64,
        rng: &mut R,
    ) -> f64 {
        let mut null_effects = vec![0.0; std_errs.len()];
        let mut exceed: u64 = 0;
        for _ in 0..num_samples {
            for (b, s) in null_effects.iter_mut().zip(std_errs) {
                let z: f64 = rng.sample(StandardNormal);
                *b = s * z;
            }
            if self.statistic(&null_effects, std_errs) >= observed {
                exceed += 1;
            }
        }
        exceed as f64 / num_samples as f64
    }

    /// Binary-effects p-value for the `marker`-th analyzed marker, or `None`
    /// when it has too many studies for exact m-values.
    pub fn pvalue(&self, data: &StudyData, stream: &RandomStream, marker: u64) -> Option<f64> {
        if data.len() > self.max_studies {
            return None;
        }
        let observed = self.statistic(&data.effects, &data.std_errs);

        let mut rng = stream.rng(marker, SeedSlot::BinaryEffectsSmall);
        let pvalue = self.simulate_pvalue(&data.std_errs, observed, self.small_sample, &mut rng);
        if pvalue > self.threshold {
            return Some(pvalue);
        }

        let mut rng = stream.rng(marker, SeedSlot::BinaryEffectsLarge);
        Some(self.simulate_pvalue(&data.std_errs, observed, self.large_sample, &mut rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn estimator(small: u64, large: u64, threshold: f64) -> BinaryEffectsEstimator {
        BinaryEffectsEstimator {
            prior: MvaluePrior {
                alpha: 1.0,
                beta: 1.0,
                sigma: 0.2,
            },
            max_studies: 10,
            small_sample: small,
            large_sample: large,
            threshold,
        }
    }

    fn data(effects: &[f64], std_errs: &[f64]) -> StudyData {
        StudyData {
            effects: effects.to_vec(),
            std_errs: std_errs.to_vec(),
            slots: (0..effects.len()).collect(),
        }
    }

    #[test]
    fn test_statistic_of_identical_studies_is_weighted_z() {
        let est = estimator(10, 10, 0.5);
        // Equal m-values cancel: S = |beta| * sqrt(k) / se.
        let s = est.statistic(&[0.3, 0.3, 0.3], &[0.1, 0.1, 0.1]);
        assert!((s - 0.3 * 3f64.sqrt() / 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_pvalue_non_increasing_in_observed() {
        let est = estimator(200, 200, 0.0);
        let se = [0.1, 0.2, 0.15];
        let mut last = 1.0;
        for step in 0..8 {
            let observed = step as f64 * 0.75;
            let mut rng = SmallRng::seed_from_u64(11);
            let p = est.simulate_pvalue(&se, observed, 200, &mut rng);
            assert!(p <= last);
            last = p;
        }
        assert_eq!(last, 0.0);
    }

    #[test]
    fn test_pvalue_non_increasing_in_effect_size() {
        let est = estimator(300, 300, 0.0);
        let stream = RandomStream::new(5);
        let mut last = 1.0;
        for step in 0..6 {
            let beta = step as f64 * 0.02;
            let p = est
                .pvalue(&data(&[beta, beta, beta], &[0.1, 0.1, 0.1]), &stream, 0)
                .unwrap();
            assert!(p <= last, "p {} > previous {}", p, last);
            last = p;
        }
    }

    #[test]
    fn test_second_stage_only_below_threshold() {
        let stream = RandomStream::new(1);
        let d = data(&[0.0, 0.01], &[0.1, 0.1]);
        // Non-significant marker: stage-one resolution (multiples of 1/20).
        let p = estimator(20, 5000, 1e-4).pvalue(&d, &stream, 0).unwrap();
        assert!(((p * 20.0).round() - p * 20.0).abs() < 1e-9);

        let strong = data(&[0.8, 0.9], &[0.1, 0.1]);
        let p = estimator(20, 5000, 0.05).pvalue(&strong, &stream, 0).unwrap();
        assert!(p < 0.05);
    }

    #[test]
    fn test_too_many_studies_skipped() {
        let est = estimator(10, 10, 0.5);
        let d = data(&[0.1; 11], &[0.1; 11]);
        assert!(est.pvalue(&d, &RandomStream::new(0), 0).is_none());
    }

    #[test]
    fn test_study_limit_comes_from_binary_effects_option() {
        let config = MetaConfig {
            input: "markers.txt".into(),
            exact_max_studies: 25,
            binary_effects_max_studies: 4,
            ..MetaConfig::default()
        };
        let est = BinaryEffectsEstimator {
            small_sample: 10,
            large_sample: 10,
            ..BinaryEffectsEstimator::from_config(&config)
        };
        assert_eq!(est.max_studies, 4);
        let stream = RandomStream::new(0);
        assert!(est.pvalue(&data(&[0.1; 4], &[0.1; 4]), &stream, 0).is_some());
        assert!(est.pvalue(&data(&[0.1; 5], &[0.1; 5]), &stream, 0).is_none());
    }
}
