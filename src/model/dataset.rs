use std::collections::HashMap;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use chrono::{Duration, NaiveDateTime};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::common::data::{f64_column, read_from_csv, str_column};
use crate::common::time::parse_timestamp;
use crate::io::export::validate_feature_table;
use crate::pipeline::features::CategoryEncoder;
use crate::types::LabelPolicy;

/// The columns the classifier consumes, in model input order. Every name here
/// is reconstructible at serving time from a prediction request alone;
/// `season_code` resolves through the persisted season encoder.
pub const MODEL_FEATURES: &[&str] = &[
    "temp", "tavg", "tmin", "prcp",
    "temp_roll3", "temp_roll7", "tavg_roll3", "tavg_roll7", "tmin_roll3",
    "hour", "dayofweek", "month",
    "temp_range", "heat_index", "is_peak", "is_weekend", "dist_center",
    "season_code",
];

/// A feature table loaded for training: row-major matrix in `MODEL_FEATURES`
/// order, binary labels, and the fitted categorical encoders.
///
/// Numeric gaps from unresolved weather joins arrive as NaN; imputation is
/// deliberately left to the trainer so test rows get training-split means.
#[derive(Debug)]
pub struct TrainingTable {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
    pub timestamps: Vec<NaiveDateTime>,
    pub season_encoder: CategoryEncoder,
    pub landcover_encoder: CategoryEncoder,
}

/// Load a prepared feature table and derive supervised targets via `policy`.
pub fn load_training_table(path: &Path, policy: &LabelPolicy) -> Result<TrainingTable> {
    let df = read_from_csv(path)?;
    validate_feature_table(&df)
        .with_context(|| format!("Invalid feature table: {}", path.display()))?;
    ensure!(df.height() > 0, "Feature table is empty: {}", path.display());

    let timestamps = str_column(&df, "timestamp")?
        .iter()
        .map(|s| parse_timestamp(s))
        .collect::<Result<Vec<_>>>()?;

    let incident_types = str_column(&df, "incident_type")?;
    let labels: Vec<f64> = incident_types
        .iter()
        .map(|t| if policy.is_heat_related(t) { 1.0 } else { 0.0 })
        .collect();

    let seasons = str_column(&df, "season")?;
    let mut season_encoder = CategoryEncoder::default();
    season_encoder.fit(seasons.iter().map(String::as_str));

    // The landcover encoder is fitted and persisted even though landcover is
    // not a model input: it keeps the export's categorical vocabulary pinned
    // alongside the model artifact.
    let landcover_types = str_column(&df, "landcover_type")?;
    let mut landcover_encoder = CategoryEncoder::default();
    landcover_encoder.fit(landcover_types.iter().map(String::as_str));

    let mut columns: HashMap<&str, Vec<f64>> = HashMap::new();
    for &name in MODEL_FEATURES {
        if name == "season_code" {
            let codes = seasons
                .iter()
                .map(|s| {
                    season_encoder
                        .encode(s)
                        .map(|c| c as f64)
                        .with_context(|| format!("Unencodable season value: {s}"))
                })
                .collect::<Result<Vec<_>>>()?;
            columns.insert(name, codes);
        } else {
            columns.insert(name, f64_column(&df, name)?);
        }
    }

    let features: Vec<Vec<f64>> = (0..df.height())
        .map(|row| MODEL_FEATURES.iter().map(|&name| columns[name][row]).collect())
        .collect();

    Ok(TrainingTable {
        feature_names: MODEL_FEATURES.iter().map(|s| (*s).to_string()).collect(),
        features,
        labels,
        timestamps,
        season_encoder,
        landcover_encoder,
    })
}

/// Chronology-preserving train/test split: the trailing `holdout_days` before
/// the newest row form the test set, so evaluation never sees the past
/// predicted from the future. A row exactly at the cutoff trains; only rows
/// strictly after it are held out.
///
/// Falls back to an 80/20 chronological split when the cut leaves either side
/// empty (short or lopsided histories).
pub fn temporal_split(timestamps: &[NaiveDateTime], holdout_days: i64) -> (Vec<usize>, Vec<usize>) {
    assert!(!timestamps.is_empty(), "cannot split an empty table");
    let max_ts = *timestamps.iter().max().unwrap();
    let cutoff = max_ts - Duration::days(holdout_days);

    let train: Vec<usize> =
        (0..timestamps.len()).filter(|&i| timestamps[i] <= cutoff).collect();
    let test: Vec<usize> =
        (0..timestamps.len()).filter(|&i| timestamps[i] > cutoff).collect();
    if !train.is_empty() && !test.is_empty() {
        return (train, test);
    }

    log::warn!(
        "Temporal cut at {cutoff} left an empty split; falling back to a chronological 80/20 split"
    );
    let mut order: Vec<usize> = (0..timestamps.len()).collect();
    order.sort_by_key(|&i| timestamps[i]);
    let pivot = (order.len() * 4 / 5).clamp(1, order.len().saturating_sub(1).max(1));
    let test = order.split_off(pivot);
    (order, test)
}

/// Seeded stratified random split: `test_fraction` of each class lands in the
/// test set, so rare positives are never all swallowed by one side. Trades the
/// temporal guarantee away for class balance; opt-in via `--stratified-split`.
pub fn stratified_split(
    labels: &[f64],
    test_fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    assert!(!labels.is_empty(), "cannot split an empty table");
    assert!(
        test_fraction > 0.0 && test_fraction < 1.0,
        "test fraction must lie in (0, 1)"
    );
    let mut rng = StdRng::seed_from_u64(seed);

    let mut train = Vec::new();
    let mut test = Vec::new();
    for class in [true, false] {
        let mut members: Vec<usize> = (0..labels.len())
            .filter(|&i| (labels[i] >= 0.5) == class)
            .collect();
        if members.is_empty() {
            continue;
        }
        members.shuffle(&mut rng);
        // At least one row on each side whenever the class has two or more.
        let n_test = ((members.len() as f64 * test_fraction).round() as usize)
            .clamp(usize::from(members.len() > 1), members.len() - 1);
        test.extend(members.drain(..n_test));
        train.extend(members);
    }
    (train, test)
}

/// Gather the rows at `indices` into owned (features, labels) vectors.
pub fn select_rows(table: &TrainingTable, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let features = indices.iter().map(|&i| table.features[i].clone()).collect();
    let labels = indices.iter().map(|&i| table.labels[i]).collect();
    (features, labels)
}

/// Seeded stratified k-fold indices: each fold's test slice preserves the
/// class ratio. Returns `(train, test)` index pairs, one per fold.
pub fn stratified_kfold(labels: &[f64], folds: usize, seed: u64) -> Vec<(Vec<usize>, Vec<usize>)> {
    assert!(folds >= 2, "need at least two folds");
    let mut rng = StdRng::seed_from_u64(seed);

    let mut positives: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] >= 0.5).collect();
    let mut negatives: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] < 0.5).collect();
    positives.shuffle(&mut rng);
    negatives.shuffle(&mut rng);

    let mut fold_members: Vec<Vec<usize>> = vec![Vec::new(); folds];
    for (n, &idx) in positives.iter().chain(&negatives).enumerate() {
        fold_members[n % folds].push(idx);
    }

    (0..folds)
        .map(|f| {
            let test = fold_members[f].clone();
            let train = fold_members
                .iter()
                .enumerate()
                .filter(|(g, _)| *g != f)
                .flat_map(|(_, m)| m.iter().copied())
                .collect();
            (train, test)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 6, day).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn temporal_split_holds_out_the_tail() {
        let timestamps: Vec<_> = (1..=28).map(ts).collect();
        let (train, test) = temporal_split(&timestamps, 7);
        assert!(!train.is_empty() && !test.is_empty());
        let cut = ts(28) - Duration::days(7);
        assert!(train.iter().all(|&i| timestamps[i] <= cut));
        assert!(test.iter().all(|&i| timestamps[i] > cut));
    }

    #[test]
    fn temporal_split_cutoff_row_trains() {
        // Daily timestamps land exactly on the cutoff; that day must train.
        let timestamps: Vec<_> = (1..=28).map(ts).collect();
        let (train, test) = temporal_split(&timestamps, 7);
        let cutoff = ts(28) - Duration::days(7); // == ts(21)
        let at_cutoff = timestamps.iter().position(|&t| t == cutoff).unwrap();
        assert!(train.contains(&at_cutoff));
        assert!(!test.contains(&at_cutoff));
        assert_eq!(test.len(), 7); // days 22..=28
    }

    #[test]
    fn short_history_falls_back_to_ratio_split() {
        // All rows inside the holdout window; the cut would empty the train side.
        let timestamps: Vec<_> = (1..=10).map(ts).collect();
        let (train, test) = temporal_split(&timestamps, 90);
        assert_eq!(train.len() + test.len(), 10);
        assert!(!train.is_empty() && !test.is_empty());
        // Chronological: every train row precedes every test row.
        let max_train = train.iter().map(|&i| timestamps[i]).max().unwrap();
        let min_test = test.iter().map(|&i| timestamps[i]).min().unwrap();
        assert!(max_train <= min_test);
    }

    #[test]
    fn stratified_split_keeps_class_ratio_on_both_sides() {
        // 10 positives, 40 negatives.
        let labels: Vec<f64> = (0..50).map(|i| if i % 5 == 0 { 1.0 } else { 0.0 }).collect();
        let (train, test) = stratified_split(&labels, 0.2, 42);
        assert_eq!(train.len() + test.len(), 50);

        let pos = |idx: &[usize]| idx.iter().filter(|&&i| labels[i] >= 0.5).count();
        assert_eq!(pos(&test), 2); // 20% of 10
        assert_eq!(pos(&train), 8);
        assert_eq!(test.len(), 10);

        // Deterministic under the same seed.
        assert_eq!(stratified_split(&labels, 0.2, 42), (train, test));
    }

    #[test]
    fn stratified_split_never_empties_a_two_row_class() {
        let labels = [1.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let (train, test) = stratified_split(&labels, 0.5, 7);
        let pos = |idx: &[usize]| idx.iter().filter(|&&i| labels[i] >= 0.5).count();
        assert_eq!(pos(&train), 1);
        assert_eq!(pos(&test), 1);
    }

    #[test]
    fn kfold_covers_every_row_once_and_stratifies() {
        let labels: Vec<f64> = (0..30).map(|i| if i % 3 == 0 { 1.0 } else { 0.0 }).collect();
        let folds = stratified_kfold(&labels, 5, 42);
        assert_eq!(folds.len(), 5);

        let mut seen = vec![0usize; labels.len()];
        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), labels.len());
            for &i in test {
                seen[i] += 1;
            }
            let pos = test.iter().filter(|&&i| labels[i] >= 0.5).count();
            assert!(pos >= 1, "fold lost the minority class");
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn kfold_is_seed_deterministic() {
        let labels: Vec<f64> = (0..20).map(|i| f64::from(i % 2)).collect();
        assert_eq!(stratified_kfold(&labels, 4, 7), stratified_kfold(&labels, 4, 7));
        assert_ne!(stratified_kfold(&labels, 4, 7), stratified_kfold(&labels, 4, 8));
    }
}
