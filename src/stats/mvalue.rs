//! Posterior m-values: the probability that each study has a true effect.
//!
//! # Model
//!
//! Each study is either null (true effect exactly 0) or carries a shared
//! effect `mu ~ N(0, sigma^2)`. An inclusion pattern assigns every study to
//! one of the two hypotheses. Integrating `mu` out, a pattern with non-null
//! set `H` has (up to a pattern-independent constant) log-likelihood
//!
//! ```text
//! -1/2 ln(1 + sigma^2 W) + sigma^2 S^2 / (2 (1 + sigma^2 W)),
//! W = sum_{i in H} 1/V_i,   S = sum_{i in H} beta_i / V_i
//! ```
//!
//! and the number of non-null studies follows a Beta-Binomial prior
//! `B(|H| + alpha, k - |H| + beta) / B(alpha, beta)` per pattern.
//!
//! Three strategies estimate the per-study marginal inclusion probabilities:
//! exact enumeration of all `2^k` patterns, Metropolis-Hastings sampling over
//! patterns, and a deterministic mean-field approximation.

use crate::config::{MetaConfig, MvalueMethod};
use crate::marker::StudyData;
use crate::seed::{RandomStream, SeedSlot};
use rand::seq::index;
use rand::Rng;
use statrs::function::gamma::ln_gamma;

/// Prior hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MvaluePrior {
    pub alpha: f64,
    pub beta: f64,
    pub sigma: f64,
}

impl MvaluePrior {
    pub fn from_config(config: &MetaConfig) -> Self {
        Self {
            alpha: config.prior_alpha,
            beta: config.prior_beta,
            sigma: config.prior_sigma,
        }
    }
}

fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Posterior weight function over inclusion patterns for one marker.
#[derive(Debug, Clone)]
pub struct PatternModel {
    /// 1/V_i
    precision: Vec<f64>,
    /// beta_i / V_i
    scaled_effect: Vec<f64>,
    sigma2: f64,
    alpha: f64,
    beta: f64,
    /// Log prior of a single pattern, indexed by its number of non-null studies.
    log_prior: Vec<f64>,
}

impl PatternModel {
    pub fn new(effects: &[f64], std_errs: &[f64], prior: &MvaluePrior) -> Self {
        let precision: Vec<f64> = std_errs.iter().map(|s| 1.0 / (s * s)).collect();
        let scaled_effect: Vec<f64> = effects.iter().zip(&precision).map(|(b, p)| b * p).collect();
        let k = effects.len();
        let norm = ln_beta(prior.alpha, prior.beta);
        let log_prior = (0..=k)
            .map(|k1| {
                ln_beta(k1 as f64 + prior.alpha, (k - k1) as f64 + prior.beta) - norm
            })
            .collect();
        Self {
            precision,
            scaled_effect,
            sigma2: prior.sigma * prior.sigma,
            alpha: prior.alpha,
            beta: prior.beta,
            log_prior,
        }
    }

    pub fn from_data(data: &StudyData, prior: &MvaluePrior) -> Self {
        Self::new(&data.effects, &data.std_errs, prior)
    }

    pub fn len(&self) -> usize {
        self.precision.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precision.is_empty()
    }

    #[inline]
    fn log_likelihood(&self, sum_precision: f64, sum_scaled: f64) -> f64 {
        let denom = 1.0 + self.sigma2 * sum_precision;
        -0.5 * denom.ln() + 0.5 * self.sigma2 * sum_scaled * sum_scaled / denom
    }

    /// Unnormalized log posterior weight of a pattern.
    pub fn log_weight(&self, pattern: &[bool]) -> f64 {
        let mut count = 0;
        let mut sum_precision = 0.0;
        let mut sum_scaled = 0.0;
        for (i, &on) in pattern.iter().enumerate() {
            if on {
                count += 1;
                sum_precision += self.precision[i];
                sum_scaled += self.scaled_effect[i];
            }
        }
        self.log_prior[count] + self.log_likelihood(sum_precision, sum_scaled)
    }

    /// Unnormalized log posterior weight of the pattern encoded by `mask`.
    pub fn log_weight_mask(&self, mask: u64) -> f64 {
        let mut sum_precision = 0.0;
        let mut sum_scaled = 0.0;
        let mut bits = mask;
        while bits != 0 {
            let i = bits.trailing_zeros() as usize;
            sum_precision += self.precision[i];
            sum_scaled += self.scaled_effect[i];
            bits &= bits - 1;
        }
        self.log_prior[mask.count_ones() as usize] + self.log_likelihood(sum_precision, sum_scaled)
    }

    /// Log posterior with the pattern relaxed to inclusion probabilities.
    ///
    /// Agrees with `log_weight` when every entry of `phi` is 0 or 1.
    fn relaxed_log_weight(&self, phi: &[f64]) -> f64 {
        let k = self.len() as f64;
        let mut count = 0.0;
        let mut sum_precision = 0.0;
        let mut sum_scaled = 0.0;
        for (i, &p) in phi.iter().enumerate() {
            count += p;
            sum_precision += p * self.precision[i];
            sum_scaled += p * self.scaled_effect[i];
        }
        let log_prior =
            ln_beta(count + self.alpha, k - count + self.beta) - ln_beta(self.alpha, self.beta);
        log_prior + self.log_likelihood(sum_precision, sum_scaled)
    }
}

/// Exact m-values by full enumeration.
///
/// Patterns are visited one at a time with a running log-sum-exp, so time is
/// `O(2^k k)` and memory is `O(k)`; callers bound `k`.
pub fn exact_mvalues(model: &PatternModel) -> Vec<f64> {
    let k = model.len();
    let mut max = f64::NEG_INFINITY;
    let mut total = 0.0;
    let mut included = vec![0.0; k];

    for mask in 0..(1u64 << k) {
        let lw = model.log_weight_mask(mask);
        if lw > max {
            // Rescale everything accumulated so far to the new maximum.
            let scale = (max - lw).exp();
            total *= scale;
            for m in included.iter_mut() {
                *m *= scale;
            }
            max = lw;
        }
        let w = (lw - max).exp();
        total += w;
        let mut bits = mask;
        while bits != 0 {
            included[bits.trailing_zeros() as usize] += w;
            bits &= bits - 1;
        }
    }

    for m in included.iter_mut() {
        *m = (*m / total).clamp(0.0, 1.0);
    }
    included
}

/// Metropolis-Hastings settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McmcParams {
    pub sample: u64,
    pub burnin: u64,
    /// Probability of proposing a uniformly random pattern.
    pub prob_random: f64,
    /// Upper bound on flipped bits per local move, as a fraction of k.
    pub max_num_flip: f64,
}

/// M-values estimated by Metropolis-Hastings over inclusion patterns.
///
/// Runs `burnin` discarded iterations followed by `sample` retained ones.
pub fn mcmc_mvalues<R: Rng + ?Sized>(model: &PatternModel, params: &McmcParams, rng: &mut R) -> Vec<f64> {
    let k = model.len();
    if k == 0 {
        return Vec::new();
    }
    let max_flip = ((k as f64 * params.max_num_flip).floor() as usize).clamp(1, k);

    let mut current: Vec<bool> = (0..k).map(|_| rng.gen_bool(0.5)).collect();
    let mut current_weight = model.log_weight(&current);
    let mut proposal = current.clone();
    let mut counts = vec![0u64; k];

    for iteration in 0..params.burnin + params.sample {
        proposal.copy_from_slice(&current);
        if rng.gen::<f64>() < params.prob_random {
            for bit in proposal.iter_mut() {
                *bit = rng.gen_bool(0.5);
            }
        } else {
            let num_flip = rng.gen_range(1..=max_flip);
            for i in index::sample(rng, k, num_flip).iter() {
                proposal[i] = !proposal[i];
            }
        }

        let proposal_weight = model.log_weight(&proposal);
        let log_ratio = proposal_weight - current_weight;
        if log_ratio >= 0.0 || rng.gen::<f64>().ln() < log_ratio {
            std::mem::swap(&mut current, &mut proposal);
            current_weight = proposal_weight;
        }

        if iteration >= params.burnin {
            for (count, &on) in counts.iter_mut().zip(&current) {
                if on {
                    *count += 1;
                }
            }
        }
    }

    counts
        .iter()
        .map(|&c| c as f64 / params.sample as f64)
        .collect()
}

const VARIATIONAL_MAX_SWEEPS: usize = 1000;
const VARIATIONAL_TOLERANCE: f64 = 1e-8;

/// Mean-field approximation of the m-values.
///
/// Coordinate updates set each inclusion probability to the logistic of the
/// relaxed log-posterior difference between including and excluding the
/// study, holding the others at their current probabilities. This is an
/// approximation with no guarantee of matching the exact posterior.
pub fn variational_mvalues(model: &PatternModel) -> Vec<f64> {
    let k = model.len();
    let mut phi = vec![0.5; k];

    for _ in 0..VARIATIONAL_MAX_SWEEPS {
        let mut max_change: f64 = 0.0;
        for i in 0..k {
            let old = phi[i];
            phi[i] = 1.0;
            let on = model.relaxed_log_weight(&phi);
            phi[i] = 0.0;
            let off = model.relaxed_log_weight(&phi);
            let updated = 1.0 / (1.0 + (off - on).exp());
            phi[i] = updated;
            max_change = max_change.max((updated - old).abs());
        }
        if max_change < VARIATIONAL_TOLERANCE {
            break;
        }
    }
    phi
}

/// Strategy chosen once from the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MvalueEstimator {
    Exact { max_studies: usize },
    Mcmc(McmcParams),
    Variational,
}

impl MvalueEstimator {
    pub fn from_config(config: &MetaConfig) -> Self {
        match config.mvalue_method {
            MvalueMethod::Exact => Self::Exact {
                max_studies: config.exact_max_studies,
            },
            MvalueMethod::Mcmc => Self::Mcmc(McmcParams {
                sample: config.mcmc_sample,
                burnin: config.mcmc_burnin,
                prob_random: config.mcmc_prob_random,
                max_num_flip: config.mcmc_max_num_flip,
            }),
            MvalueMethod::Variational => Self::Variational,
        }
    }

    /// Per-study m-values for the non-missing studies of the `marker`-th
    /// analyzed marker, or `None` when exact enumeration would exceed its
    /// study limit.
    pub fn estimate(
        &self,
        data: &StudyData,
        prior: &MvaluePrior,
        stream: &RandomStream,
        marker: u64,
    ) -> Option<Vec<f64>> {
        let model = PatternModel::from_data(data, prior);
        match self {
            Self::Exact { max_studies } => {
                if data.len() > *max_studies {
                    return None;
                }
                Some(exact_mvalues(&model))
            }
            Self::Mcmc(params) => {
                let mut rng = stream.rng(marker, SeedSlot::MvalueMcmc);
                Some(mcmc_mvalues(&model, params, &mut rng))
            }
            Self::Variational => Some(variational_mvalues(&model)),
        }
    }
}
