//! Lag-based feature engineering over a single demand series.
//!
//! For a series `y` and a target position `t`, a lag `k` feature is
//! `y[t - k]`, and every transform attached to lag `k` is evaluated over the
//! series shifted by `k`, i.e. over `y[..=t - k]`. Positions without enough
//! history produce `NaN`; the estimators deal with missing values themselves.

use serde::{Deserialize, Serialize};

use stockcast_core::MaterialId;

/// Statistic computed over a lagged series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LagTransform {
    /// Mean of the last `window` values; needs a full window.
    RollingMean { window: usize },
    RollingMin { window: usize },
    RollingMax { window: usize },
    /// Exponentially weighted mean: `s0 = x0`, `si = alpha * xi + (1 - alpha) * s(i-1)`.
    EwmMean { alpha: f64 },
}

impl LagTransform {
    pub fn name(&self, lag: usize) -> String {
        match self {
            LagTransform::RollingMean { window } => format!("rolling_mean_lag{lag}_window_size{window}"),
            LagTransform::RollingMin { window } => format!("rolling_min_lag{lag}_window_size{window}"),
            LagTransform::RollingMax { window } => format!("rolling_max_lag{lag}_window_size{window}"),
            LagTransform::EwmMean { alpha } => format!("ewm_mean_lag{lag}_alpha{alpha}"),
        }
    }

    /// Value at the last position of `shifted`.
    pub fn apply(&self, shifted: &[f64]) -> f64 {
        match *self {
            LagTransform::RollingMean { window } => match tail(shifted, window) {
                Some(w) => w.iter().sum::<f64>() / window as f64,
                None => f64::NAN,
            },
            LagTransform::RollingMin { window } => match tail(shifted, window) {
                Some(w) => w.iter().copied().fold(f64::INFINITY, f64::min),
                None => f64::NAN,
            },
            LagTransform::RollingMax { window } => match tail(shifted, window) {
                Some(w) => w.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                None => f64::NAN,
            },
            LagTransform::EwmMean { alpha } => {
                let mut it = shifted.iter();
                let Some(first) = it.next() else {
                    return f64::NAN;
                };
                it.fold(*first, |s, x| alpha * x + (1.0 - alpha) * s)
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        match *self {
            LagTransform::RollingMean { window }
            | LagTransform::RollingMin { window }
            | LagTransform::RollingMax { window } => {
                if window == 0 {
                    return Err("rolling window must be >= 1".to_string());
                }
            }
            LagTransform::EwmMean { alpha } => {
                if !(alpha.is_finite() && alpha > 0.0 && alpha <= 1.0) {
                    return Err("ewm alpha must be in (0, 1]".to_string());
                }
            }
        }
        Ok(())
    }
}

fn tail(xs: &[f64], window: usize) -> Option<&[f64]> {
    if window == 0 || xs.len() < window {
        return None;
    }
    Some(&xs[xs.len() - window..])
}

/// One lag and the transforms evaluated on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagSpec {
    pub lag: usize,
    pub transforms: Vec<LagTransform>,
}

impl LagSpec {
    pub fn new(lag: usize, transforms: Vec<LagTransform>) -> Self {
        Self { lag, transforms }
    }
}

/// Column layout of the model input: the material id as a static feature,
/// then for every lag its raw value followed by its transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub lags: Vec<LagSpec>,
}

pub const STATIC_ID_FEATURE: &str = "MaterialID";

impl FeatureSpec {
    pub fn new(lags: Vec<LagSpec>) -> Self {
        Self { lags }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.lags.is_empty() {
            return Err("at least one lag is required".to_string());
        }
        for spec in &self.lags {
            if spec.lag == 0 {
                return Err("lags must be >= 1".to_string());
            }
            for t in &spec.transforms {
                t.validate()?;
            }
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = vec![STATIC_ID_FEATURE.to_string()];
        for spec in &self.lags {
            names.push(format!("lag{}", spec.lag));
            names.extend(spec.transforms.iter().map(|t| t.name(spec.lag)));
        }
        names
    }

    pub fn width(&self) -> usize {
        1 + self
            .lags
            .iter()
            .map(|s| 1 + s.transforms.len())
            .sum::<usize>()
    }

    /// Features for the position right after `history`.
    pub fn row(&self, material: MaterialId, history: &[f64]) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.width());
        row.push(material.as_feature());

        for spec in &self.lags {
            if history.len() < spec.lag {
                row.push(f64::NAN);
                row.extend(spec.transforms.iter().map(|_| f64::NAN));
                continue;
            }
            let shifted = &history[..=history.len() - spec.lag];
            row.push(shifted[shifted.len() - 1]);
            row.extend(spec.transforms.iter().map(|t| t.apply(shifted)));
        }
        row
    }
}
