//! DerSimonian-Laird random-effects pooling and Cochran's Q.

use super::chi_square_sf;
use super::fixed::pool_weighted;
use crate::marker::{PooledEstimate, RandomEffects, StudyData};

/// Random-effects estimate for a marker whose fixed-effects estimate is `fixed`.
///
/// When the between-study variance is zero the fixed-effects estimate is
/// returned unchanged.
pub fn random_effects(data: &StudyData, fixed: &PooledEstimate) -> RandomEffects {
    let k = data.len() as f64;
    let weights = data.weights();

    let q: f64 = data
        .effects
        .iter()
        .zip(&weights)
        .map(|(b, w)| w * (b - fixed.beta).powi(2))
        .sum();

    let sum_w: f64 = weights.iter().sum();
    let sum_w2: f64 = weights.iter().map(|w| w * w).sum();
    let denominator = sum_w - sum_w2 / sum_w;
    let tau_square = if denominator > 0.0 {
        ((q - (k - 1.0)) / denominator).max(0.0)
    } else {
        0.0
    };

    let pooled = if tau_square > 0.0 {
        let re_weights: Vec<f64> = data
            .variances()
            .iter()
            .map(|v| 1.0 / (v + tau_square))
            .collect();
        pool_weighted(&data.effects, &re_weights)
    } else {
        *fixed
    };

    let i_square = if q > k - 1.0 && q > 0.0 {
        (q - (k - 1.0)) / q * 100.0
    } else {
        0.0
    };

    RandomEffects {
        pooled,
        q,
        pvalue_q: chi_square_sf(k - 1.0, q),
        i_square,
        tau_square,
    }
}
