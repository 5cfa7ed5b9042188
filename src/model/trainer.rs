use std::path::Path;

use anyhow::{ensure, Context, Result};
use chrono::Utc;

use crate::common::fs::check_overwrite;
use crate::model::balance::smote_oversample;
use crate::model::bundle::{Classifier, ModelBundle};
use crate::model::dataset::{
    load_training_table, select_rows, stratified_kfold, stratified_split, temporal_split,
    TrainingTable,
};
use crate::model::ensemble::{self, GbdtParams};
use crate::model::logistic::{LogisticModel, LogisticParams};
use crate::model::metrics::{accuracy, average_precision, precision_recall_f1, roc_auc};
use crate::model::scaler::StandardScaler;
use crate::model::threshold::select_threshold;
use crate::pipeline::features::MeanImputer;
use crate::types::LabelPolicy;

/// Training-run knobs; the defaults reproduce the standard run.
#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    /// Days of trailing history held out as the evaluation set.
    pub holdout_days: i64,
    /// When set, replaces the temporal holdout with a seeded stratified
    /// random split holding out this fraction of each class.
    pub stratified_fraction: Option<f64>,
    /// Neighbors considered when synthesizing minority rows.
    pub smote_k: usize,
    /// Seed for oversampling and fold assignment.
    pub seed: u64,
    /// Stratified cross-validation folds reported during training.
    pub cv_folds: usize,
    /// Reference coordinate baked into the bundle for `dist_center`.
    pub center: (f64, f64),
    pub gbdt: GbdtParams,
    pub logistic: LogisticParams,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            holdout_days: 90,
            stratified_fraction: None,
            smote_k: 3,
            seed: 42,
            cv_folds: 5,
            center: (12.9716, 77.5946),
            gbdt: GbdtParams::default(),
            logistic: LogisticParams::default(),
        }
    }
}

/// What a training run measured, for logs and callers alike.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub chosen: String,
    pub gbdt_ap: f64,
    pub logistic_ap: f64,
    pub gbdt_auc: f64,
    pub logistic_auc: f64,
    pub threshold: f64,
    pub threshold_f1: f64,
    pub n_train: usize,
    pub n_test: usize,
}

fn impute_columns(
    rows: &mut [Vec<f64>],
    names: &[String],
    imputer: &MeanImputer,
) {
    for (j, name) in names.iter().enumerate() {
        let Some(mean) = imputer.mean_for(name) else { continue };
        for row in rows.iter_mut() {
            if !row[j].is_finite() {
                row[j] = mean;
            }
        }
    }
}

fn fit_imputer(rows: &[Vec<f64>], names: &[String]) -> MeanImputer {
    let mut imputer = MeanImputer::default();
    for (j, name) in names.iter().enumerate() {
        let column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
        imputer.fit_column(name, &column);
    }
    imputer
}

/// Mean cross-validated average precision for both model families on the
/// balanced training split. Purely informational; selection happens on the
/// temporal holdout.
fn cross_validate(rows: &[Vec<f64>], labels: &[f64], opts: &TrainOptions) -> Result<(f64, f64)> {
    let folds = stratified_kfold(labels, opts.cv_folds, opts.seed);
    let mut gbdt_aps = Vec::new();
    let mut logistic_aps = Vec::new();

    for (train_idx, test_idx) in &folds {
        let train_rows: Vec<Vec<f64>> = train_idx.iter().map(|&i| rows[i].clone()).collect();
        let train_labels: Vec<f64> = train_idx.iter().map(|&i| labels[i]).collect();
        let test_rows: Vec<Vec<f64>> = test_idx.iter().map(|&i| rows[i].clone()).collect();
        let test_labels: Vec<f64> = test_idx.iter().map(|&i| labels[i]).collect();

        let single_class = train_labels.iter().all(|&y| y >= 0.5)
            || train_labels.iter().all(|&y| y < 0.5);
        if single_class || test_labels.is_empty() {
            continue;
        }

        let gbdt = ensemble::train_gbdt(&train_rows, &train_labels, opts.gbdt)?;
        gbdt_aps.push(average_precision(
            &ensemble::predict_proba(&gbdt, &test_rows),
            &test_labels,
        ));

        let logistic = LogisticModel::train(&train_rows, &train_labels, opts.logistic)?;
        logistic_aps.push(average_precision(
            &logistic.predict_batch(&test_rows)?,
            &test_labels,
        ));
    }

    let mean = |v: &[f64]| if v.is_empty() { f64::NAN } else { v.iter().sum::<f64>() / v.len() as f64 };
    Ok((mean(&gbdt_aps), mean(&logistic_aps)))
}

/// Train both model families on a prepared feature table and persist the
/// winner as a serving bundle.
///
/// Stages: temporal split, train-only imputation, minority oversampling,
/// standardization, cross-validation for the record, holdout evaluation,
/// selection by average precision (ties favor the simpler logistic model),
/// threshold tuning, bundle export.
pub fn run_train(
    features_path: &Path,
    output_path: &Path,
    policy: &LabelPolicy,
    opts: &TrainOptions,
    force: bool,
) -> Result<TrainReport> {
    // Fail before the expensive part, not after.
    check_overwrite(output_path, force)?;

    let table: TrainingTable = load_training_table(features_path, policy)?;
    let positives = table.labels.iter().filter(|&&y| y >= 0.5).count();
    log::info!(
        "Loaded {} rows ({} positive / {} negative) from {}",
        table.labels.len(),
        positives,
        table.labels.len() - positives,
        features_path.display()
    );
    ensure!(
        positives > 0 && positives < table.labels.len(),
        "Training needs both classes; label policy [{}] matched {positives} of {} rows",
        policy.types().join(", "),
        table.labels.len()
    );

    let (train_idx, test_idx) = match opts.stratified_fraction {
        Some(fraction) => {
            ensure!(
                fraction > 0.0 && fraction < 1.0,
                "Stratified test fraction must lie in (0, 1), got {fraction}"
            );
            stratified_split(&table.labels, fraction, opts.seed)
        }
        None => temporal_split(&table.timestamps, opts.holdout_days),
    };
    let (mut train_rows, train_labels) = select_rows(&table, &train_idx);
    let (mut test_rows, test_labels) = select_rows(&table, &test_idx);
    log::info!(
        "{} split: {} train / {} test rows",
        if opts.stratified_fraction.is_some() { "Stratified" } else { "Temporal" },
        train_rows.len(),
        test_rows.len()
    );

    let imputer = fit_imputer(&train_rows, &table.feature_names);
    impute_columns(&mut train_rows, &table.feature_names, &imputer);
    impute_columns(&mut test_rows, &table.feature_names, &imputer);

    let (balanced_rows, balanced_labels) =
        smote_oversample(&train_rows, &train_labels, opts.smote_k, opts.seed)?;
    if balanced_rows.len() > train_rows.len() {
        log::info!(
            "Oversampled training split from {} to {} rows",
            train_rows.len(),
            balanced_rows.len()
        );
    }

    let scaler = StandardScaler::fit(&balanced_rows)?;
    let mut scaled_train = balanced_rows;
    scaler.transform(&mut scaled_train)?;
    let mut scaled_test = test_rows;
    scaler.transform(&mut scaled_test)?;

    let (cv_gbdt, cv_logistic) = cross_validate(&scaled_train, &balanced_labels, opts)?;
    log::info!("Cross-validated AP: gradient_boosting={cv_gbdt:.3} logistic_regression={cv_logistic:.3}");

    let gbdt = ensemble::train_gbdt(&scaled_train, &balanced_labels, opts.gbdt)?;
    let logistic = LogisticModel::train(&scaled_train, &balanced_labels, opts.logistic)?;

    let gbdt_probs = ensemble::predict_proba(&gbdt, &scaled_test);
    let logistic_probs = logistic.predict_batch(&scaled_test)?;

    let gbdt_ap = average_precision(&gbdt_probs, &test_labels);
    let logistic_ap = average_precision(&logistic_probs, &test_labels);
    let gbdt_auc = roc_auc(&gbdt_probs, &test_labels);
    let logistic_auc = roc_auc(&logistic_probs, &test_labels);
    log::info!("Holdout: gradient_boosting ap={gbdt_ap:.3} auc={gbdt_auc:.3}");
    log::info!("Holdout: logistic_regression ap={logistic_ap:.3} auc={logistic_auc:.3}");

    let (classifier, winner_probs) = if gbdt_ap > logistic_ap {
        (Classifier::Gbdt(gbdt), gbdt_probs)
    } else {
        (Classifier::Logistic(logistic), logistic_probs)
    };

    let (threshold, threshold_f1) = select_threshold(&winner_probs, &test_labels);
    let (precision, recall, _) = precision_recall_f1(&winner_probs, &test_labels, threshold);
    let acc = accuracy(&winner_probs, &test_labels, threshold);
    log::info!(
        "Selected {} with threshold {threshold:.3} (f1={threshold_f1:.3} p={precision:.3} r={recall:.3} acc={acc:.3})",
        classifier.name()
    );

    let bundle = ModelBundle {
        model_name: classifier.name().to_string(),
        classifier,
        feature_names: table.feature_names.clone(),
        threshold,
        scaler,
        season_encoder: table.season_encoder,
        landcover_encoder: table.landcover_encoder,
        imputer,
        center: opts.center,
        trained_at: Utc::now().naive_utc(),
    };
    bundle.save(output_path, force)?;

    Ok(TrainReport {
        chosen: bundle.model_name.clone(),
        gbdt_ap,
        logistic_ap,
        gbdt_auc,
        logistic_auc,
        threshold,
        threshold_f1,
        n_train: scaled_train.len(),
        n_test: scaled_test.len(),
    })
}
