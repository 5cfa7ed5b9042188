use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Per-feature standardization (zero mean, unit variance), fit on the
/// training split only and persisted inside the model bundle so serving
/// applies the exact same transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit on a row-major feature matrix. Constant columns get a std of 1.0
    /// so scaling them is the identity shift instead of a division by zero.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        ensure!(!rows.is_empty(), "Cannot fit scaler on an empty matrix");
        let width = rows[0].len();
        ensure!(
            rows.iter().all(|r| r.len() == width),
            "Ragged feature matrix: expected {width} columns in every row"
        );

        let n = rows.len() as f64;
        let mut means = vec![0.0; width];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut stds = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in stds.iter_mut().zip(row).zip(&means) {
                *s += (v - m) * (v - m);
            }
        }
        for s in &mut stds {
            *s = (*s / n).sqrt();
            if *s == 0.0 || !s.is_finite() {
                *s = 1.0;
            }
        }

        Ok(Self { means, stds })
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    /// Scale one row in place.
    pub fn transform_row(&self, row: &mut [f64]) -> Result<()> {
        ensure!(
            row.len() == self.means.len(),
            "Row has {} values but the scaler was fit on {}",
            row.len(),
            self.means.len()
        );
        for ((v, m), s) in row.iter_mut().zip(&self.means).zip(&self.stds) {
            *v = (*v - m) / s;
        }
        Ok(())
    }

    pub fn transform(&self, rows: &mut [Vec<f64>]) -> Result<()> {
        for row in rows {
            self.transform_row(row)?;
        }
        Ok(())
    }
}
