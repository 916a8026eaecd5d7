//! Core marker types: per-study observations and the per-marker result bundle.

use std::fmt;

/// One study's contribution to a marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StudyObservation {
    /// Effect size estimate with its standard error (always > 0).
    Observed { effect: f64, std_err: f64 },
    Missing,
}

impl StudyObservation {
    #[inline]
    pub fn observed(effect: f64, std_err: f64) -> Self {
        Self::Observed { effect, std_err }
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Returns `(effect, std_err)` for observed studies.
    #[inline]
    pub fn pair(&self) -> Option<(f64, f64)> {
        match *self {
            Self::Observed { effect, std_err } => Some((effect, std_err)),
            Self::Missing => None,
        }
    }
}

/// Effect and standard-error vectors of the non-missing studies of a marker.
///
/// Estimators operate on this compact view; `slots` maps each entry back to
/// its study column so per-study outputs can be re-expanded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudyData {
    pub effects: Vec<f64>,
    pub std_errs: Vec<f64>,
    pub slots: Vec<usize>,
}

impl StudyData {
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Sampling variances (se²).
    pub fn variances(&self) -> Vec<f64> {
        self.std_errs.iter().map(|s| s * s).collect()
    }

    /// Inverse-variance weights (1/se²).
    pub fn weights(&self) -> Vec<f64> {
        self.std_errs.iter().map(|s| 1.0 / (s * s)).collect()
    }
}

/// A parsed input line: marker identifier plus one observation per study column.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRecord {
    pub rsid: String,
    pub studies: Vec<StudyObservation>,
}

impl MarkerRecord {
    pub fn new(rsid: impl Into<String>) -> Self {
        Self {
            rsid: rsid.into(),
            studies: Vec::new(),
        }
    }

    /// Number of study columns, including missing ones.
    #[inline]
    pub fn num_slots(&self) -> usize {
        self.studies.len()
    }

    /// Number of non-missing studies.
    pub fn num_observed(&self) -> usize {
        self.studies.iter().filter(|s| !s.is_missing()).count()
    }

    /// Markers need at least two usable studies to be analyzed.
    #[inline]
    pub fn is_analyzable(&self) -> bool {
        self.num_observed() >= 2
    }

    /// Collect the non-missing studies in column order.
    pub fn observed(&self) -> StudyData {
        let mut data = StudyData::default();
        for (slot, obs) in self.studies.iter().enumerate() {
            if let Some((effect, std_err)) = obs.pair() {
                data.effects.push(effect);
                data.std_errs.push(std_err);
                data.slots.push(slot);
            }
        }
        data
    }
}

impl fmt::Display for MarkerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} studies)", self.rsid, self.num_observed())
    }
}

/// Pooled estimate under one weighting scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PooledEstimate {
    pub beta: f64,
    pub std_err: f64,
    pub z: f64,
    pub pvalue: f64,
}

/// Random-effects estimate plus the heterogeneity summary it was derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomEffects {
    pub pooled: PooledEstimate,
    pub q: f64,
    pub pvalue_q: f64,
    pub i_square: f64,
    pub tau_square: f64,
}

/// Han-Eskin decomposed statistic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HanEskin {
    pub mean_effect_part: f64,
    pub heterogeneity_part: f64,
    pub statistic: f64,
    pub pvalue: f64,
}

/// Statistics computed for one analyzed marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerStats {
    pub fixed: PooledEstimate,
    pub random: RandomEffects,
    pub han_eskin: HanEskin,
    pub binary_effects_pvalue: Option<f64>,
    /// One entry per study column; `None` for missing studies.
    pub mvalues: Option<Vec<Option<f64>>>,
}

/// Everything the writer needs for one output row.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerResult {
    pub rsid: String,
    pub num_observed: usize,
    /// Two-sided per-study p-values, one per study column.
    pub study_pvalues: Vec<Option<f64>>,
    /// `None` for markers with fewer than two usable studies.
    pub stats: Option<MarkerStats>,
}
