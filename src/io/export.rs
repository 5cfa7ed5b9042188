use std::path::Path;

use anyhow::{bail, Result};
use polars::df;
use polars::frame::DataFrame;

use crate::common::data::write_csv_bytes;
use crate::common::fs::{check_overwrite, write_atomic};
use crate::pipeline::features::{self, EngineeredFeatures};
use crate::types::{FeatureRow, PipelineConfig};

/// The feature-table contract. Every export carries exactly these columns in
/// this order; the trainer refuses tables that do not match.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "timestamp", "lat", "lon", "incident_type", "severity",
    "temp", "tavg", "tmin", "prcp",
    "temp_roll3", "temp_roll7", "tavg_roll3", "tavg_roll7", "tmin_roll3",
    "hour", "dayofweek", "month", "dayofyear",
    "temp_range", "heat_index", "is_peak", "is_weekend", "dist_center",
    "hour_sin", "hour_cos", "month_sin", "month_cos",
    "season", "landcover_type",
    "urban_density", "vegetation_cover", "water_bodies",
    "green_urban_ratio", "water_availability",
];

/// Columns an export may carry in addition to the required set.
pub const OPTIONAL_COLUMNS: &[&str] = &["weather_dist", "temp_std_roll3"];

/// Check a loaded feature table against the contract: every required column
/// present, nothing outside required + optional.
pub fn validate_feature_table(df: &DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    for required in REQUIRED_COLUMNS {
        if !names.iter().any(|n| n == required) {
            bail!("Feature table is missing required column: {required}");
        }
    }
    for name in &names {
        let known = REQUIRED_COLUMNS.contains(&name.as_str())
            || OPTIONAL_COLUMNS.contains(&name.as_str());
        if !known {
            bail!("Feature table has unknown column: {name}");
        }
    }
    Ok(())
}

/// Build and write the feature table CSV.
///
/// Rows with unresolved categorical joins (no containing landcover polygon)
/// are dropped here rather than exported with null categories. Numeric gaps
/// from a failed weather match stay null; the trainer imputes them with
/// training-split means.
pub fn export_feature_table(
    rows: &[FeatureRow],
    cfg: &PipelineConfig,
    path: &Path,
    force: bool,
) -> Result<usize> {
    check_overwrite(path, force)?;

    let kept: Vec<&FeatureRow> = rows.iter().filter(|r| r.landcover.is_some()).collect();
    let dropped = rows.len() - kept.len();
    if dropped > 0 {
        log::info!("Dropping {dropped} rows with unresolved landcover join");
    }

    let engineered: Vec<EngineeredFeatures> = kept
        .iter()
        .map(|r| features::engineer(r.timestamp, r.lat, r.lon, r.weather.as_ref(), cfg.center))
        .collect();

    let opt = |f: fn(&FeatureRow) -> Option<f64>| -> Vec<Option<f64>> {
        kept.iter().map(|r| f(r)).collect::<Vec<_>>()
    };
    let lc = |f: fn(&crate::types::LandcoverSample) -> f64| -> Vec<f64> {
        kept.iter().map(|r| f(r.landcover.as_ref().unwrap())).collect::<Vec<_>>()
    };

    let df = df![
        "timestamp" => kept.iter().map(|r| r.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()).collect::<Vec<_>>(),
        "lat" => kept.iter().map(|r| r.lat).collect::<Vec<_>>(),
        "lon" => kept.iter().map(|r| r.lon).collect::<Vec<_>>(),
        "incident_type" => kept.iter().map(|r| r.incident_type.clone()).collect::<Vec<_>>(),
        "severity" => kept.iter().map(|r| r.severity).collect::<Vec<_>>(),
        "temp" => opt(|r| r.weather.map(|w| w.temp)),
        "tavg" => opt(|r| r.weather.map(|w| w.tavg)),
        "tmin" => opt(|r| r.weather.map(|w| w.tmin)),
        "prcp" => opt(|r| r.weather.map(|w| w.prcp)),
        "temp_roll3" => opt(|r| r.rolling.map(|x| x.temp_roll3)),
        "temp_roll7" => opt(|r| r.rolling.map(|x| x.temp_roll7)),
        "tavg_roll3" => opt(|r| r.rolling.map(|x| x.tavg_roll3)),
        "tavg_roll7" => opt(|r| r.rolling.map(|x| x.tavg_roll7)),
        "tmin_roll3" => opt(|r| r.rolling.map(|x| x.tmin_roll3)),
        "temp_std_roll3" => opt(|r| r.rolling.map(|x| x.temp_std_roll3)),
        "hour" => engineered.iter().map(|e| i64::from(e.hour)).collect::<Vec<_>>(),
        "dayofweek" => engineered.iter().map(|e| i64::from(e.dayofweek)).collect::<Vec<_>>(),
        "month" => engineered.iter().map(|e| i64::from(e.month)).collect::<Vec<_>>(),
        "dayofyear" => engineered.iter().map(|e| i64::from(e.dayofyear)).collect::<Vec<_>>(),
        "temp_range" => engineered.iter().map(|e| e.temp_range).collect::<Vec<_>>(),
        "heat_index" => engineered.iter().map(|e| e.heat_index).collect::<Vec<_>>(),
        "is_peak" => engineered.iter().map(|e| e.is_peak).collect::<Vec<_>>(),
        "is_weekend" => engineered.iter().map(|e| e.is_weekend).collect::<Vec<_>>(),
        "dist_center" => engineered.iter().map(|e| e.dist_center).collect::<Vec<_>>(),
        "hour_sin" => engineered.iter().map(|e| e.hour_sin).collect::<Vec<_>>(),
        "hour_cos" => engineered.iter().map(|e| e.hour_cos).collect::<Vec<_>>(),
        "month_sin" => engineered.iter().map(|e| e.month_sin).collect::<Vec<_>>(),
        "month_cos" => engineered.iter().map(|e| e.month_cos).collect::<Vec<_>>(),
        "season" => engineered.iter().map(|e| e.season.to_string()).collect::<Vec<_>>(),
        "landcover_type" => kept.iter().map(|r| r.landcover.as_ref().unwrap().landcover_type.clone()).collect::<Vec<_>>(),
        "urban_density" => lc(|l| l.urban_density),
        "vegetation_cover" => lc(|l| l.vegetation_cover),
        "water_bodies" => lc(|l| l.water_bodies),
        "green_urban_ratio" => kept.iter().map(|r| {
            let l = r.landcover.as_ref().unwrap();
            features::green_urban_ratio(l.vegetation_cover, l.urban_density)
        }).collect::<Vec<_>>(),
        "water_availability" => kept.iter().map(|r| {
            let l = r.landcover.as_ref().unwrap();
            features::water_availability(l.water_bodies, l.vegetation_cover)
        }).collect::<Vec<_>>(),
        "weather_dist" => opt(|r| r.weather_dist),
    ]?;

    validate_feature_table(&df)?;

    // df! preserves declaration order, so the CSV matches the contract order.
    let bytes = write_csv_bytes(&df)?;
    write_atomic(path, &bytes)?;
    log::info!("Exported {} feature rows to {}", kept.len(), path.display());
    Ok(kept.len())
}
