use anyhow::{ensure, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// L2-regularized logistic regression trained by full-batch gradient descent.
/// Small and serializable, it rides inside the model bundle as the fallback
/// classifier next to the boosted trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    weights: Vec<f64>,
    bias: f64,
}

/// Training hyperparameters. The defaults converge comfortably on scaled
/// features at this dataset's scale.
#[derive(Debug, Clone, Copy)]
pub struct LogisticParams {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self { epochs: 500, learning_rate: 0.1, l2: 1e-3 }
    }
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticModel {
    /// Fit on a row-major matrix of scaled features and {0, 1} labels.
    pub fn train(rows: &[Vec<f64>], labels: &[f64], params: LogisticParams) -> Result<Self> {
        ensure!(!rows.is_empty(), "Cannot train on an empty matrix");
        ensure!(rows.len() == labels.len(), "features/labels length mismatch");
        let width = rows[0].len();
        ensure!(
            rows.iter().all(|r| r.len() == width),
            "Ragged feature matrix: expected {width} columns in every row"
        );

        let n = rows.len();
        let x = Array2::from_shape_fn((n, width), |(i, j)| rows[i][j]);
        let y = Array1::from_iter(labels.iter().copied());

        let mut w = Array1::<f64>::zeros(width);
        let mut b = 0.0_f64;

        for _ in 0..params.epochs {
            let z = x.dot(&w) + b;
            let p = z.mapv(sigmoid);
            let residual = &p - &y;
            let grad_w = x.t().dot(&residual) / n as f64 + params.l2 * &w;
            let grad_b = residual.sum() / n as f64;
            w -= &(params.learning_rate * &grad_w);
            b -= params.learning_rate * grad_b;
        }

        Ok(Self { weights: w.to_vec(), bias: b })
    }

    pub fn width(&self) -> usize {
        self.weights.len()
    }

    /// Probability of the positive class for one scaled feature row.
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64> {
        ensure!(
            row.len() == self.weights.len(),
            "Row has {} values but the model was trained on {}",
            row.len(),
            self.weights.len()
        );
        let z: f64 = self.weights.iter().zip(row).map(|(w, v)| w * v).sum::<f64>() + self.bias;
        Ok(sigmoid(z))
    }

    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|r| self.predict_proba(r)).collect()
    }
}
