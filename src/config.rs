//! Run configuration for the meta-analysis.
//!
//! A `MetaConfig` is built once (normally from the command line), validated
//! before any file is opened, and then shared read-only by every estimator.

use crate::error::{MetaError, Result};
use clap::ValueEnum;
use std::fmt;
use std::path::PathBuf;

/// Hard ceiling for the exact m-value enumeration limit (2^30 patterns).
pub const EXACT_STUDY_CEILING: usize = 30;

/// Hard ceiling for the binary-effects study limit. Every simulated replicate
/// enumerates 2^k patterns, so the per-marker cost is (small + large) * 2^k.
pub const BINARY_EFFECTS_STUDY_CEILING: usize = 15;

/// Posterior m-value estimation strategy, chosen once at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MvalueMethod {
    /// Enumerate every inclusion pattern.
    Exact,
    /// Metropolis-Hastings random walk over inclusion patterns.
    Mcmc,
    /// Deterministic mean-field approximation.
    Variational,
}

impl MvalueMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Mcmc => "mcmc",
            Self::Variational => "variational",
        }
    }
}

impl fmt::Display for MvalueMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full set of recognized options.
#[derive(Debug, Clone)]
pub struct MetaConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub log: PathBuf,
    pub pvalue_table: PathBuf,
    pub lambda_mean: f64,
    pub lambda_hetero: f64,
    pub compute_mvalue: bool,
    pub mvalue_method: MvalueMethod,
    pub mvalue_p_threshold: f64,
    pub prior_sigma: f64,
    pub prior_alpha: f64,
    pub prior_beta: f64,
    /// Markers with more usable studies than this skip exact enumeration.
    pub exact_max_studies: usize,
    pub mcmc_sample: u64,
    pub mcmc_burnin: u64,
    pub mcmc_prob_random: f64,
    pub mcmc_max_num_flip: f64,
    pub compute_binary_effects: bool,
    pub binary_effects_sample: u64,
    pub binary_effects_large_sample: u64,
    pub binary_effects_p_threshold: f64,
    /// Markers with more usable studies than this get no binary-effects p-value.
    pub binary_effects_max_studies: usize,
    pub seed: u64,
    pub threads: usize,
    pub verbose: bool,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: PathBuf::from("out"),
            log: PathBuf::from("log"),
            pvalue_table: PathBuf::from("HanEskinPvalueTable.txt"),
            lambda_mean: 1.0,
            lambda_hetero: 1.0,
            compute_mvalue: false,
            mvalue_method: MvalueMethod::Exact,
            mvalue_p_threshold: 1e-7,
            prior_sigma: 0.2,
            prior_alpha: 1.0,
            prior_beta: 1.0,
            exact_max_studies: 20,
            mcmc_sample: 10_000,
            mcmc_burnin: 1_000,
            mcmc_prob_random: 0.01,
            mcmc_max_num_flip: 0.1,
            compute_binary_effects: false,
            binary_effects_sample: 1_000,
            binary_effects_large_sample: 100_000,
            binary_effects_p_threshold: 1e-4,
            binary_effects_max_studies: 10,
            seed: 0,
            threads: 1,
            verbose: false,
        }
    }
}

fn positive(x: f64) -> bool {
    x > 0.0
}

fn in_unit_interval(x: f64) -> bool {
    (0.0..=1.0).contains(&x)
}

impl MetaConfig {
    /// Check every option constraint.
    ///
    /// Must be called before any input, output or table file is opened.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(MetaError::Config(msg.to_string()));

        if self.input.as_os_str().is_empty() {
            return fail("a valid input file must be specified using --input");
        }
        // NaN must fail, so test for positivity rather than `<= 0`.
        if !positive(self.lambda_mean) {
            return fail("--lambda-mean takes a float value > 0");
        }
        if !positive(self.lambda_hetero) {
            return fail("--lambda-hetero takes a float value > 0");
        }
        if !positive(self.prior_sigma) {
            return fail("--mvalue-prior-sigma takes a float value > 0");
        }
        if !positive(self.prior_alpha) || !positive(self.prior_beta) {
            return fail("--mvalue-prior-beta takes two float values > 0");
        }
        if !in_unit_interval(self.mvalue_p_threshold) {
            return fail("--mvalue-p-thres takes a float value between 0 and 1");
        }
        if self.exact_max_studies == 0 || self.exact_max_studies > EXACT_STUDY_CEILING {
            return Err(MetaError::Config(format!(
                "--mvalue-exact-max-studies takes an integer value between 1 and {}",
                EXACT_STUDY_CEILING
            )));
        }
        if self.mcmc_sample < 1 {
            return fail("--mcmc-sample takes an integer value > 0");
        }
        if self.mcmc_burnin < 1 {
            return fail("--mcmc-burnin takes an integer value > 0");
        }
        if self.mcmc_sample < self.mcmc_burnin {
            return fail("--mcmc-sample must be at least --mcmc-burnin");
        }
        if !in_unit_interval(self.mcmc_prob_random) {
            return fail("--mcmc-prob-random takes a float value between 0 and 1");
        }
        if !positive(self.mcmc_max_num_flip) {
            return fail("--mcmc-max-num-flip takes a value > 0");
        }
        if self.binary_effects_sample < 1 {
            return fail("--binary-effects-sample takes an integer value > 0");
        }
        if self.binary_effects_large_sample < 1 {
            return fail("--binary-effects-large takes an integer value > 0");
        }
        if !in_unit_interval(self.binary_effects_p_threshold) {
            return fail("--binary-effects-p-thres takes a float value between 0 and 1");
        }
        if self.binary_effects_max_studies == 0
            || self.binary_effects_max_studies > BINARY_EFFECTS_STUDY_CEILING
        {
            return Err(MetaError::Config(format!(
                "--binary-effects-max-studies takes an integer value between 1 and {}",
                BINARY_EFFECTS_STUDY_CEILING
            )));
        }
        if self.threads == 0 {
            return fail("--threads takes an integer value > 0");
        }
        Ok(())
    }

    /// One-line echo of the effective options, used on stderr and in the log file.
    pub fn summary(&self) -> String {
        let mut s = format!(
            "--input {} --output {} --log {} --pvalue-table {} --lambda-mean {} --lambda-hetero {}",
            self.input.display(),
            self.output.display(),
            self.log.display(),
            self.pvalue_table.display(),
            self.lambda_mean,
            self.lambda_hetero,
        );
        if self.compute_mvalue {
            s.push_str(&format!(
                " --mvalue --mvalue-method {} --mvalue-p-thres {} --mvalue-prior-sigma {} \
                 --mvalue-prior-beta {} {} --mvalue-exact-max-studies {}",
                self.mvalue_method,
                self.mvalue_p_threshold,
                self.prior_sigma,
                self.prior_alpha,
                self.prior_beta,
                self.exact_max_studies,
            ));
            if self.mvalue_method == MvalueMethod::Mcmc {
                s.push_str(&format!(
                    " --mcmc-sample {} --mcmc-burnin {} --mcmc-prob-random {} --mcmc-max-num-flip {}",
                    self.mcmc_sample, self.mcmc_burnin, self.mcmc_prob_random, self.mcmc_max_num_flip,
                ));
            }
        }
        if self.compute_binary_effects {
            s.push_str(&format!(
                " --binary-effects --binary-effects-sample {} --binary-effects-large {} \
                 --binary-effects-p-thres {} --binary-effects-max-studies {}",
                self.binary_effects_sample,
                self.binary_effects_large_sample,
                self.binary_effects_p_threshold,
                self.binary_effects_max_studies,
            ));
        }
        s.push_str(&format!(" --seed {}", self.seed));
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> MetaConfig {
        MetaConfig {
            input: PathBuf::from("input.txt"),
            ..MetaConfig::default()
        }
    }

    #[test]
    fn test_default_with_input_is_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_input_rejected() {
        assert!(matches!(
            MetaConfig::default().validate(),
            Err(MetaError::Config(_))
        ));
    }

    #[test]
    fn test_out_of_range_options_rejected() {
        let cases: Vec<Box<dyn Fn(&mut MetaConfig)>> = vec![
            Box::new(|c| c.lambda_mean = 0.0),
            Box::new(|c| c.lambda_hetero = -1.0),
            Box::new(|c| c.prior_sigma = f64::NAN),
            Box::new(|c| c.prior_beta = 0.0),
            Box::new(|c| c.mvalue_p_threshold = 1.5),
            Box::new(|c| c.mcmc_sample = 10),
            Box::new(|c| c.mcmc_prob_random = -0.1),
            Box::new(|c| c.mcmc_max_num_flip = 0.0),
            Box::new(|c| c.binary_effects_large_sample = 0),
            Box::new(|c| c.binary_effects_p_threshold = 2.0),
            Box::new(|c| c.exact_max_studies = EXACT_STUDY_CEILING + 1),
            Box::new(|c| c.binary_effects_max_studies = 0),
            Box::new(|c| c.binary_effects_max_studies = BINARY_EFFECTS_STUDY_CEILING + 1),
            Box::new(|c| c.threads = 0),
        ];
        for (i, mutate) in cases.iter().enumerate() {
            let mut cfg = valid();
            mutate(&mut cfg);
            assert!(cfg.validate().is_err(), "case {} should be rejected", i);
        }
    }

    #[test]
    fn test_binary_effects_limit_independent_of_exact_limit() {
        let mut cfg = valid();
        cfg.exact_max_studies = EXACT_STUDY_CEILING;
        cfg.binary_effects_max_studies = BINARY_EFFECTS_STUDY_CEILING;
        assert!(cfg.validate().is_ok());
        cfg.binary_effects_max_studies = EXACT_STUDY_CEILING;
        assert!(matches!(
            cfg.validate(),
            Err(MetaError::Config(msg)) if msg.contains("--binary-effects-max-studies")
        ));
    }

    #[test]
    fn test_method_value_names() {
        assert_eq!(
            MvalueMethod::from_str("MCMC", true),
            Ok(MvalueMethod::Mcmc)
        );
        assert!(MvalueMethod::from_str("gibbs", true).is_err());
        let names: Vec<String> = MvalueMethod::value_variants()
            .iter()
            .filter_map(|m| m.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(names, ["exact", "mcmc", "variational"]);
    }

    #[test]
    fn test_summary_mentions_method_only_when_enabled() {
        let mut cfg = valid();
        assert!(!cfg.summary().contains("--mvalue-method"));
        cfg.compute_mvalue = true;
        cfg.mvalue_method = MvalueMethod::Mcmc;
        let s = cfg.summary();
        assert!(s.contains("--mvalue-method mcmc"));
        assert!(s.contains("--mcmc-sample 10000"));
    }
}
