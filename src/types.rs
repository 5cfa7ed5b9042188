use chrono::NaiveDateTime;
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// One weather observation at a grid point.
/// Invariant: one record per (location, timestamp) pair; `temp >= tmin` is
/// expected from the source data but not enforced here.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRecord {
    pub timestamp: NaiveDateTime,
    pub lat: f64,
    pub lon: f64,
    pub temp: f64, // daily maximum (tmax in the raw export)
    pub tavg: f64,
    pub tmin: f64,
    pub prcp: f64,
}

/// One reported incident. Immutable once loaded; joined, then discarded
/// after feature export.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentRecord {
    pub timestamp: NaiveDateTime,
    pub lat: f64,
    pub lon: f64,
    pub incident_type: String,
    pub severity: i64,
}

/// Static land-cover reference polygon with density attributes.
#[derive(Debug, Clone)]
pub struct LandcoverPolygon {
    pub geometry: MultiPolygon<f64>,
    pub landcover_type: String,
    pub urban_density: f64,    // [0, 1]
    pub vegetation_cover: f64, // [0, 1]
    pub water_bodies: f64,     // [0, ~0.3]
}

/// Instantaneous readings inherited from the nearest weather point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherSample {
    pub temp: f64,
    pub tavg: f64,
    pub tmin: f64,
    pub prcp: f64,
}

/// Rolling aggregates attached by the temporal aligner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingSample {
    pub temp_roll3: f64,
    pub temp_roll7: f64,
    pub tavg_roll3: f64,
    pub tavg_roll7: f64,
    pub tmin_roll3: f64,
    pub temp_std_roll3: f64,
}

/// Land-cover attributes inherited from the containing polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct LandcoverSample {
    pub landcover_type: String,
    pub urban_density: f64,
    pub vegetation_cover: f64,
    pub water_bodies: f64,
}

/// The join product: one row per incident. Unresolved joins are represented
/// as `None` rather than errors; rows whose categorical joins stay unresolved
/// are dropped at export.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub timestamp: NaiveDateTime,
    pub lat: f64,
    pub lon: f64,
    pub incident_type: String,
    pub severity: i64,
    pub weather: Option<WeatherSample>,
    pub weather_dist: Option<f64>,
    pub rolling: Option<RollingSample>,
    pub landcover: Option<LandcoverSample>,
}

/// Temporal alignment granularity for attaching rolling weather context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AlignMode {
    /// Truncate both sides to the day and merge on equal day.
    Day,
    /// Backward asof join on floored hours (never a future record).
    Hour,
}

/// Which incident types count as heat-related when labeling.
///
/// The positive-class set materially changes the supervised target, so it is
/// explicit configuration rather than a literal buried in the trainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPolicy {
    heat_types: Vec<String>,
}

impl LabelPolicy {
    /// Only `heat_stroke` counts as positive.
    pub fn heat_stroke_only() -> Self {
        Self { heat_types: vec!["heat_stroke".into()] }
    }

    /// Broadened positive class covering secondary heat effects.
    pub fn broad() -> Self {
        Self {
            heat_types: ["heat_stroke", "dehydration", "fainting", "heat_exhaustion"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    pub fn custom(types: Vec<String>) -> Self {
        Self { heat_types: types }
    }

    pub fn is_heat_related(&self, incident_type: &str) -> bool {
        self.heat_types.iter().any(|t| t == incident_type)
    }

    pub fn types(&self) -> &[String] {
        &self.heat_types
    }
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self::broad()
    }
}

/// Offline pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Reference coordinate for `dist_center` (lat, lon).
    pub center: (f64, f64),
    /// Reject nearest-weather matches farther than this (planar degrees).
    pub max_weather_distance: Option<f64>,
    /// Keep only the trailing N days of weather history.
    pub trailing_days: Option<i64>,
    pub align: AlignMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            // Bengaluru city center
            center: (12.9716, 77.5946),
            max_weather_distance: None,
            trailing_days: Some(365),
            align: AlignMode::Day,
        }
    }
}
