use anyhow::{ensure, Result};
use gbdt::config::Config;
use gbdt::decision_tree::Data;
use gbdt::gradient_boost::GBDT;

/// Gradient-boosted-trees hyperparameters.
#[derive(Debug, Clone, Copy)]
pub struct GbdtParams {
    pub iterations: usize,
    pub max_depth: u32,
    pub shrinkage: f32,
    pub min_leaf_size: usize,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self { iterations: 120, max_depth: 4, shrinkage: 0.1, min_leaf_size: 2 }
    }
}

/// Train a boosted-trees classifier on {0, 1} labels.
///
/// The `LogLikelyhood` loss expects +1/-1 targets and emits calibrated
/// probabilities at predict time; the 0/1 convention stays at this boundary.
pub fn train_gbdt(rows: &[Vec<f64>], labels: &[f64], params: GbdtParams) -> Result<GBDT> {
    ensure!(!rows.is_empty(), "Cannot train on an empty matrix");
    ensure!(rows.len() == labels.len(), "features/labels length mismatch");
    let width = rows[0].len();
    ensure!(
        rows.iter().all(|r| r.len() == width),
        "Ragged feature matrix: expected {width} columns in every row"
    );

    let mut cfg = Config::new();
    cfg.set_feature_size(width);
    cfg.set_max_depth(params.max_depth);
    cfg.set_iterations(params.iterations);
    cfg.set_shrinkage(params.shrinkage);
    cfg.set_loss("LogLikelyhood");
    cfg.set_debug(false);
    cfg.set_training_optimization_level(2);
    cfg.set_min_leaf_size(params.min_leaf_size);

    let mut model = GBDT::new(&cfg);
    let mut training: Vec<Data> = rows
        .iter()
        .zip(labels)
        .map(|(row, &y)| {
            let target = if y >= 0.5 { 1.0_f32 } else { -1.0_f32 };
            Data::new_training_data(row.iter().map(|&v| v as f32).collect(), 1.0, target, None)
        })
        .collect();
    model.fit(&mut training);
    Ok(model)
}

/// Positive-class probabilities for a batch of rows, clamped to [0, 1].
/// The gbdt crate works in f32 internally; the clamp absorbs its edges.
pub fn predict_proba(model: &GBDT, rows: &[Vec<f64>]) -> Vec<f64> {
    if rows.is_empty() {
        return Vec::new();
    }
    let data: Vec<Data> = rows
        .iter()
        .map(|row| Data::new_test_data(row.iter().map(|&v| v as f32).collect(), None))
        .collect();
    model
        .predict(&data)
        .into_iter()
        .map(|p| f64::from(p).clamp(0.0, 1.0))
        .collect()
}
