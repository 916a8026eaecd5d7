//! Inverse-variance fixed-effects pooling.

use super::two_sided_normal_pvalue;
use crate::marker::{PooledEstimate, StudyData};

/// Pool `(effect, se)` pairs under arbitrary per-study weights.
///
/// Shared by the fixed- and random-effects models, which differ only in
/// the weights they pass.
pub(crate) fn pool_weighted(effects: &[f64], weights: &[f64]) -> PooledEstimate {
    let sum_w: f64 = weights.iter().sum();
    let sum_wb: f64 = effects.iter().zip(weights).map(|(b, w)| w * b).sum();

    let beta = sum_wb / sum_w;
    let std_err = (1.0 / sum_w).sqrt();
    let z = beta / std_err;
    PooledEstimate {
        beta,
        std_err,
        z,
        pvalue: two_sided_normal_pvalue(z),
    }
}

/// Fixed-effects estimate with weights 1/se².
///
/// Callers guarantee at least two studies.
pub fn fixed_effects(data: &StudyData) -> PooledEstimate {
    pool_weighted(&data.effects, &data.weights())
}
