//! Genomic-control inflation factors for the Han-Eskin statistic parts.
//!
//! After a pass, the median of each part is divided by its expected median
//! under the null. The results are meant to be fed back as
//! `--lambda-mean` / `--lambda-hetero` on a second run.

use super::chi_square_one_median;
use crate::marker::HanEskin;

/// Empirical null medians of the heterogeneity part (positive values only),
/// indexed by study count starting at 2.
const EXPECTED_HETERO_MEDIAN: [f64; 49] = [
    0.2195907137, 0.2471516439, 0.2642270318, 0.2780769264, 0.2886280267, 0.2977812664,
    0.3020051148, 0.3091428179, 0.3158605559, 0.3221788173, 0.3259133140, 0.3295976587,
    0.3335375196, 0.3358395088, 0.3368309971, 0.3421941686, 0.3448030927, 0.3463590948,
    0.3477384754, 0.3487900288, 0.3494938171, 0.3542087791, 0.3573286353, 0.3589703411,
    0.3586951356, 0.3596101209, 0.3605611682, 0.3624799993, 0.3648322669, 0.3659817739,
    0.3671267389, 0.3693952373, 0.3693395144, 0.3696863113, 0.3706067524, 0.3718103285,
    0.3749536619, 0.3758886239, 0.3753612342, 0.3781458299, 0.3798346038, 0.3763434983,
    0.3796968747, 0.3784334922, 0.3794411347, 0.3808582942, 0.3813485882, 0.3843230993,
    0.3824863479,
];

const TABLE_MIN_STUDIES: usize = 2;
const TABLE_MAX_STUDIES: usize = TABLE_MIN_STUDIES + EXPECTED_HETERO_MEDIAN.len() - 1;

/// Expected null median of the heterogeneity part for `max_num_studies`.
///
/// Beyond the table the chi-square(1) median is used.
pub fn expected_heterogeneity_median(max_num_studies: usize) -> f64 {
    if max_num_studies > TABLE_MAX_STUDIES {
        return chi_square_one_median();
    }
    let idx = max_num_studies.max(TABLE_MIN_STUDIES) - TABLE_MIN_STUDIES;
    EXPECTED_HETERO_MEDIAN[idx]
}

/// Upper median: the element at index `len / 2` after sorting.
fn upper_median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    Some(values[values.len() / 2])
}

/// Inflation factors; `None` when no values were recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InflationFactors {
    pub mean_effect: Option<f64>,
    pub heterogeneity: Option<f64>,
}

/// Collects Han-Eskin parts across analyzed markers.
#[derive(Debug, Clone, Default)]
pub struct CalibrationAccumulator {
    mean_effect: Vec<f64>,
    heterogeneity: Vec<f64>,
}

impl CalibrationAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one marker. Only strictly positive heterogeneity parts count.
    pub fn record(&mut self, stat: &HanEskin) {
        self.mean_effect.push(stat.mean_effect_part);
        if stat.heterogeneity_part > 0.0 {
            self.heterogeneity.push(stat.heterogeneity_part);
        }
    }

    pub fn num_mean_effect(&self) -> usize {
        self.mean_effect.len()
    }

    pub fn num_heterogeneity(&self) -> usize {
        self.heterogeneity.len()
    }

    /// Consume the accumulator and compute both factors.
    pub fn compute(mut self, max_num_studies: usize) -> InflationFactors {
        let mean_effect = upper_median(&mut self.mean_effect).map(|m| m / chi_square_one_median());
        let heterogeneity = upper_median(&mut self.heterogeneity)
            .map(|m| m / expected_heterogeneity_median(max_num_studies));
        InflationFactors {
            mean_effect,
            heterogeneity,
        }
    }
}
