use std::fs;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use gbdt::gradient_boost::GBDT;
use serde::{Deserialize, Serialize};

use crate::common::fs::{check_overwrite, write_atomic};
use crate::model::ensemble;
use crate::model::logistic::LogisticModel;
use crate::model::scaler::StandardScaler;
use crate::pipeline::features::{self, CategoryEncoder, MeanImputer};

/// The trained classifier, either family behind one scoring interface.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", content = "model")]
pub enum Classifier {
    Gbdt(GBDT),
    Logistic(LogisticModel),
}

impl Classifier {
    pub fn name(&self) -> &'static str {
        match self {
            Classifier::Gbdt(_) => "gradient_boosting",
            Classifier::Logistic(_) => "logistic_regression",
        }
    }

    /// Positive-class probability for one already-scaled row.
    pub fn predict_scaled(&self, row: &[f64]) -> Result<f64> {
        match self {
            Classifier::Gbdt(model) => {
                Ok(ensemble::predict_proba(model, &[row.to_vec()])[0])
            }
            Classifier::Logistic(model) => model.predict_proba(row),
        }
    }
}

/// Discretized risk tier derived from the raw probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskLevel {
    /// Tier boundaries are inclusive on the lower edge: 0.3 is MEDIUM,
    /// 0.6 is HIGH, 0.8 is EXTREME.
    pub fn from_score(score: f64) -> Self {
        if score < 0.3 {
            RiskLevel::Low
        } else if score < 0.6 {
            RiskLevel::Medium
        } else if score < 0.8 {
            RiskLevel::High
        } else {
            RiskLevel::Extreme
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Extreme => "EXTREME",
        }
    }
}

/// One observation to score: location, time, and the weather readings the
/// caller has on hand. Rolling fields left empty fall back to the
/// instantaneous reading, the flat-history assumption.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: NaiveDateTime,
    pub lat: f64,
    pub lon: f64,
    pub temp: f64,
    pub tavg: f64,
    pub tmin: f64,
    pub prcp: f64,
    pub temp_roll3: Option<f64>,
    pub temp_roll7: Option<f64>,
    pub tavg_roll3: Option<f64>,
    pub tavg_roll7: Option<f64>,
    pub tmin_roll3: Option<f64>,
}

/// One prediction: the raw probability, its tier, and the operating threshold
/// the tier does not depend on but callers alert against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub threshold: f64,
}

/// Everything inference needs, persisted as one JSON artifact: classifier,
/// feature order, scaler, encoders, imputation means, operating threshold.
/// Loading the bundle is sufficient to serve; no side files.
#[derive(Serialize, Deserialize)]
pub struct ModelBundle {
    pub model_name: String,
    pub classifier: Classifier,
    pub feature_names: Vec<String>,
    pub threshold: f64,
    pub scaler: StandardScaler,
    pub season_encoder: CategoryEncoder,
    pub landcover_encoder: CategoryEncoder,
    pub imputer: MeanImputer,
    pub center: (f64, f64),
    pub trained_at: NaiveDateTime,
}

impl ModelBundle {
    pub fn save(&self, path: &Path, force: bool) -> Result<()> {
        check_overwrite(path, force)?;
        let bytes = serde_json::to_vec_pretty(self).context("Failed to serialize model bundle")?;
        write_atomic(path, &bytes)?;
        log::info!("Saved {} bundle to {}", self.model_name, path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read model bundle: {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse model bundle: {}", path.display()))
    }

    /// Rebuild the model's input vector from an observation, in the bundle's
    /// persisted feature order. Derived features go through the same scalar
    /// helpers training used.
    pub fn reconstruct_features(&self, obs: &Observation) -> Result<Vec<f64>> {
        let hour = obs.timestamp.hour();
        let dayofweek = obs.timestamp.weekday().num_days_from_monday();
        let month = obs.timestamp.month();
        let (hour_sin, hour_cos) = features::cyclical(f64::from(hour), 24.0);
        let (month_sin, month_cos) = features::cyclical(f64::from(month), 12.0);

        let mut row = Vec::with_capacity(self.feature_names.len());
        for name in &self.feature_names {
            let value = match name.as_str() {
                "temp" => obs.temp,
                "tavg" => obs.tavg,
                "tmin" => obs.tmin,
                "prcp" => obs.prcp,
                "temp_roll3" => obs.temp_roll3.unwrap_or(obs.temp),
                "temp_roll7" => obs.temp_roll7.unwrap_or(obs.temp),
                "tavg_roll3" => obs.tavg_roll3.unwrap_or(obs.tavg),
                "tavg_roll7" => obs.tavg_roll7.unwrap_or(obs.tavg),
                "tmin_roll3" => obs.tmin_roll3.unwrap_or(obs.tmin),
                "hour" => f64::from(hour),
                "dayofweek" => f64::from(dayofweek),
                "month" => f64::from(month),
                "dayofyear" => f64::from(obs.timestamp.ordinal()),
                "temp_range" => features::temp_range(obs.temp, obs.tmin),
                "heat_index" => features::heat_index(obs.temp, obs.tavg),
                "is_peak" => features::is_peak(hour),
                "is_weekend" => features::is_weekend(dayofweek),
                "dist_center" => features::dist_center(obs.lat, obs.lon, self.center),
                "hour_sin" => hour_sin,
                "hour_cos" => hour_cos,
                "month_sin" => month_sin,
                "month_cos" => month_cos,
                // Unseen season encodes as -1, the missing-category code.
                "season_code" => self
                    .season_encoder
                    .encode(features::season_for_month(month))
                    .map_or(-1.0, |c| c as f64),
                other => bail!("Model requires feature {other}, which cannot be rebuilt from a prediction request"),
            };
            let value = if value.is_finite() {
                value
            } else {
                self.imputer.mean_for(name).unwrap_or(0.0)
            };
            row.push(value);
        }
        Ok(row)
    }

    /// Scale a reconstructed row and score it. Probabilities are clamped to
    /// [0, 1] on the way out.
    pub fn predict_proba(&self, mut row: Vec<f64>) -> Result<f64> {
        ensure!(
            row.len() == self.feature_names.len(),
            "Expected {} features, got {}",
            self.feature_names.len(),
            row.len()
        );
        self.scaler.transform_row(&mut row)?;
        Ok(self.classifier.predict_scaled(&row)?.clamp(0.0, 1.0))
    }

    /// Full path from observation to prediction.
    pub fn predict(&self, obs: &Observation) -> Result<Prediction> {
        let row = self.reconstruct_features(obs)?;
        let risk_score = self.predict_proba(row)?;
        Ok(Prediction {
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            threshold: self.threshold,
        })
    }
}
