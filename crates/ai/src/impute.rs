use serde::{Deserialize, Serialize};

/// Replaces missing values (`NaN`) with the training mean of their column.
///
/// A column with no observed value at all is filled with `0.0`, which makes
/// it constant and therefore never used for a split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanImputer {
    means: Vec<f64>,
}

impl MeanImputer {
    pub fn fit(x: &[Vec<f64>]) -> Self {
        let width = x.first().map(|r| r.len()).unwrap_or(0);
        let mut sums = vec![0.0; width];
        let mut counts = vec![0usize; width];
        for row in x {
            for (j, v) in row.iter().enumerate().take(width) {
                if !v.is_nan() {
                    sums[j] += v;
                    counts[j] += 1;
                }
            }
        }
        let means = sums
            .into_iter()
            .zip(counts)
            .map(|(s, c)| if c == 0 { 0.0 } else { s / c as f64 })
            .collect();
        Self { means }
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, v)| {
                if v.is_nan() {
                    self.means.get(j).copied().unwrap_or(0.0)
                } else {
                    *v
                }
            })
            .collect()
    }

    pub fn transform(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter().map(|r| self.transform_row(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_missing_with_column_means() {
        let x = vec![
            vec![1.0, f64::NAN, f64::NAN],
            vec![3.0, 4.0, f64::NAN],
            vec![f64::NAN, 8.0, f64::NAN],
        ];
        let imputer = MeanImputer::fit(&x);
        assert_eq!(imputer.means(), &[2.0, 6.0, 0.0]);

        let filled = imputer.transform(&x);
        assert_eq!(filled[0], vec![1.0, 6.0, 0.0]);
        assert_eq!(filled[2], vec![2.0, 8.0, 0.0]);
    }
}
