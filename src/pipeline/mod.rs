pub mod features;
pub mod rolling;
pub mod spatial;
pub mod temporal;

use std::path::Path;

use anyhow::{Context, Result};

use crate::io::{export, incidents, landcover, weather};
use crate::types::{
    AlignMode, FeatureRow, IncidentRecord, LandcoverPolygon, PipelineConfig, RollingSample,
    WeatherRecord, WeatherSample,
};

/// Rolling aggregates for the full weather series, row-aligned with the
/// (sorted) weather input.
#[derive(Debug)]
pub struct WeatherRolls {
    pub temp_roll3: Vec<f64>,
    pub temp_roll7: Vec<f64>,
    pub tavg_roll3: Vec<f64>,
    pub tavg_roll7: Vec<f64>,
    pub tmin_roll3: Vec<f64>,
    pub temp_std_roll3: Vec<f64>,
}

/// Compute per-location trailing windows over the weather series.
/// The input must already be sorted by (location, timestamp); the windows
/// reset per grid point and never average across locations.
pub fn compute_weather_rolls(weather: &[WeatherRecord]) -> WeatherRolls {
    let keys: Vec<_> = weather.iter().map(|w| rolling::location_key(w.lat, w.lon)).collect();
    let temp: Vec<f64> = weather.iter().map(|w| w.temp).collect();
    let tavg: Vec<f64> = weather.iter().map(|w| w.tavg).collect();
    let tmin: Vec<f64> = weather.iter().map(|w| w.tmin).collect();

    WeatherRolls {
        temp_roll3: rolling::grouped_rolling_mean(&keys, &temp, 3),
        temp_roll7: rolling::grouped_rolling_mean(&keys, &temp, 7),
        tavg_roll3: rolling::grouped_rolling_mean(&keys, &tavg, 3),
        tavg_roll7: rolling::grouped_rolling_mean(&keys, &tavg, 7),
        tmin_roll3: rolling::grouped_rolling_mean(&keys, &tmin, 3),
        temp_std_roll3: rolling::grouped_rolling_std(&keys, &temp, 3),
    }
}

/// Join incidents against weather and landcover into feature rows.
///
/// Instantaneous readings come from the nearest weather point (within the
/// optional distance cutoff); rolling context is attached by the temporal
/// aligner against the whole weather series; landcover attributes come from
/// the first containing polygon in input order.
pub fn build_feature_rows(
    incident_rows: &[IncidentRecord],
    weather: &[WeatherRecord],
    landcover_index: &spatial::LandcoverIndex,
    cfg: &PipelineConfig,
) -> Vec<FeatureRow> {
    let rolls = compute_weather_rolls(weather);

    let nearest = spatial::join_nearest_weather(incident_rows, weather, cfg.max_weather_distance);
    let containing = spatial::join_landcover(incident_rows, landcover_index);

    let incident_ts: Vec<_> = incident_rows.iter().map(|i| i.timestamp).collect();
    let weather_ts: Vec<_> = weather.iter().map(|w| w.timestamp).collect();
    let aligned = match cfg.align {
        AlignMode::Day => temporal::day_equijoin(&incident_ts, &weather_ts),
        AlignMode::Hour => temporal::asof_backward_hourly(&incident_ts, &weather_ts),
    };

    incident_rows
        .iter()
        .enumerate()
        .map(|(i, inc)| {
            let weather_sample = nearest[i].map(|m| {
                let w = &weather[m.weather_idx];
                WeatherSample { temp: w.temp, tavg: w.tavg, tmin: w.tmin, prcp: w.prcp }
            });
            let rolling_sample = aligned[i].map(|idx| RollingSample {
                temp_roll3: rolls.temp_roll3[idx],
                temp_roll7: rolls.temp_roll7[idx],
                tavg_roll3: rolls.tavg_roll3[idx],
                tavg_roll7: rolls.tavg_roll7[idx],
                tmin_roll3: rolls.tmin_roll3[idx],
                temp_std_roll3: rolls.temp_std_roll3[idx],
            });
            let landcover_sample = containing[i].map(|idx| {
                let p = &landcover_index.polygons()[idx];
                crate::types::LandcoverSample {
                    landcover_type: p.landcover_type.clone(),
                    urban_density: p.urban_density,
                    vegetation_cover: p.vegetation_cover,
                    water_bodies: p.water_bodies,
                }
            });

            FeatureRow {
                timestamp: inc.timestamp,
                lat: inc.lat,
                lon: inc.lon,
                incident_type: inc.incident_type.clone(),
                severity: inc.severity,
                weather: weather_sample,
                weather_dist: nearest[i].map(|m| m.distance),
                rolling: rolling_sample,
                landcover: landcover_sample,
            }
        })
        .collect()
}

/// Input paths for one `prepare` run.
#[derive(Debug, Clone)]
pub struct PreparePaths<'a> {
    /// A single weather CSV, or a directory of station CSVs.
    pub weather: &'a Path,
    pub incidents: &'a Path,
    pub landcover: &'a Path,
    pub output: &'a Path,
}

/// Run the whole offline feature pipeline: load, roll, join, align, engineer,
/// export. Returns the number of exported rows.
pub fn run_prepare(paths: &PreparePaths<'_>, cfg: &PipelineConfig, force: bool) -> Result<usize> {
    log::info!("Loading weather from {}", paths.weather.display());
    let mut weather = if paths.weather.is_dir() {
        weather::load_weather_dir(paths.weather, cfg.center)?
    } else {
        weather::load_weather_csv(paths.weather, cfg.center)?
    };
    if let Some(days) = cfg.trailing_days {
        let before = weather.len();
        weather = weather::filter_trailing_days(weather, days);
        log::info!("Trailing {days}-day filter kept {} of {before} weather records", weather.len());
    }
    // Sort once for grouped rolling windows; joins are order-insensitive.
    weather.sort_by(|a, b| {
        (a.lat, a.lon, a.timestamp)
            .partial_cmp(&(b.lat, b.lon, b.timestamp))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let incident_rows = incidents::load_incidents(paths.incidents)?;
    let polygons = landcover::load_landcover(paths.landcover)?;
    let landcover_index = spatial::LandcoverIndex::new(polygons);

    log::info!(
        "Joining {} incidents against {} weather records and {} landcover polygons",
        incident_rows.len(),
        weather.len(),
        landcover_index.polygons().len()
    );
    let rows = build_feature_rows(&incident_rows, &weather, &landcover_index, cfg);

    export::export_feature_table(&rows, cfg, paths.output, force)
        .context("Failed to export feature table")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::time::parse_timestamp;
    use geo::{polygon, MultiPolygon};

    fn weather(ts: &str, temp: f64) -> WeatherRecord {
        WeatherRecord {
            timestamp: parse_timestamp(ts).unwrap(),
            lat: 12.9716,
            lon: 77.5946,
            temp,
            tavg: temp - 8.0,
            tmin: temp - 12.0,
            prcp: 0.0,
        }
    }

    fn incident(ts: &str, ty: &str) -> IncidentRecord {
        IncidentRecord {
            timestamp: parse_timestamp(ts).unwrap(),
            lat: 12.97,
            lon: 77.59,
            incident_type: ty.into(),
            severity: 3,
        }
    }

    fn city_square() -> LandcoverPolygon {
        LandcoverPolygon {
            geometry: MultiPolygon(vec![polygon![
                (x: 77.4, y: 12.8),
                (x: 77.8, y: 12.8),
                (x: 77.8, y: 13.1),
                (x: 77.4, y: 13.1),
                (x: 77.4, y: 12.8),
            ]]),
            landcover_type: "urban".into(),
            urban_density: 0.8,
            vegetation_cover: 0.1,
            water_bodies: 0.02,
        }
    }

    #[test]
    fn rolls_follow_sorted_series() {
        let series = vec![
            weather("2022-06-01", 30.0),
            weather("2022-06-02", 32.0),
            weather("2022-06-03", 34.0),
        ];
        let rolls = compute_weather_rolls(&series);
        assert_eq!(rolls.temp_roll3, vec![30.0, 31.0, 32.0]);
        assert_eq!(rolls.temp_roll7[2], 32.0); // shrunken 7-window == 3 obs
    }

    #[test]
    fn day_mode_attaches_same_day_rolls() {
        let series = vec![weather("2022-06-01", 30.0), weather("2022-06-02", 36.0)];
        let rows = build_feature_rows(
            &[incident("2022-06-02T14:00", "heat_stroke")],
            &series,
            &spatial::LandcoverIndex::new(vec![city_square()]),
            &PipelineConfig::default(),
        );
        assert_eq!(rows.len(), 1);
        let roll = rows[0].rolling.unwrap();
        assert_eq!(roll.temp_roll3, 33.0);
        assert!((roll.temp_std_roll3 - 18.0_f64.sqrt()).abs() < 1e-12); // std of {30, 36}
        assert_eq!(rows[0].weather.unwrap().temp, 36.0);
        assert_eq!(rows[0].landcover.as_ref().unwrap().landcover_type, "urban");
    }

    #[test]
    fn incident_outside_every_polygon_has_no_landcover() {
        let series = vec![weather("2022-06-01", 30.0)];
        let mut far = incident("2022-06-01T10:00", "fire");
        far.lat = 40.0;
        far.lon = 40.0;
        let rows = build_feature_rows(
            &[far],
            &series,
            &spatial::LandcoverIndex::new(vec![city_square()]),
            &PipelineConfig::default(),
        );
        assert!(rows[0].landcover.is_none());
        // Weather still matches (no cutoff configured).
        assert!(rows[0].weather.is_some());
    }
}
