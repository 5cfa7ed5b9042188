use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Duration;

use crate::common::data::{f64_column, read_from_csv, resolve_alias, str_column};
use crate::common::time::parse_timestamp;
use crate::types::WeatherRecord;

/// Load a weather CSV into typed records.
///
/// Accepts the raw Bengaluru export schema (`time`/`tmax`) as well as the
/// canonical one (`timestamp`/`temp`). Records without their own `lat`/`lon`
/// columns are pinned to `default_loc` (single-station data keyed to the city
/// center).
pub fn load_weather_csv(path: &Path, default_loc: (f64, f64)) -> Result<Vec<WeatherRecord>> {
    let df = read_from_csv(path)?;
    let n = df.height();

    let ts_col = resolve_alias(&df, &["timestamp", "time"])
        .with_context(|| format!("{}: no timestamp/time column", path.display()))?;
    let temp_col = resolve_alias(&df, &["temp", "tmax"])
        .with_context(|| format!("{}: no temp/tmax column", path.display()))?;

    let timestamps = str_column(&df, ts_col)?
        .iter()
        .map(|s| parse_timestamp(s))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("{}: malformed weather timestamp", path.display()))?;

    let temp = f64_column(&df, temp_col)?;
    let tavg = f64_column(&df, "tavg")?;
    let tmin = f64_column(&df, "tmin")?;
    let prcp = f64_column(&df, "prcp")?;

    let (lat, lon) = match (resolve_alias(&df, &["lat"]), resolve_alias(&df, &["lon"])) {
        (Some(_), Some(_)) => (f64_column(&df, "lat")?, f64_column(&df, "lon")?),
        _ => (vec![default_loc.0; n], vec![default_loc.1; n]),
    };

    let mut records = Vec::with_capacity(n);
    for i in 0..n {
        records.push(WeatherRecord {
            timestamp: timestamps[i],
            lat: lat[i],
            lon: lon[i],
            temp: temp[i],
            tavg: tavg[i],
            tmin: tmin[i],
            prcp: prcp[i],
        });
    }
    Ok(records)
}

/// Load every `*.csv` under `dir` and concatenate, as the original pipeline
/// does for pre-downloaded station files. Files are visited in sorted name
/// order so ingestion is reproducible.
pub fn load_weather_dir(dir: &Path, default_loc: (f64, f64)) -> Result<Vec<WeatherRecord>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("read weather dir {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    paths.sort();
    if paths.is_empty() {
        bail!("No CSV files found in weather dir {}", dir.display());
    }

    let mut all = Vec::new();
    for path in &paths {
        all.extend(load_weather_csv(path, default_loc)?);
    }
    log::info!("Loaded {} weather records from {} CSV files", all.len(), paths.len());
    Ok(all)
}

/// Keep only the trailing `days` of history, measured back from the most
/// recent record.
pub fn filter_trailing_days(records: Vec<WeatherRecord>, days: i64) -> Vec<WeatherRecord> {
    let Some(max_ts) = records.iter().map(|r| r.timestamp).max() else {
        return records;
    };
    let cutoff = max_ts - Duration::days(days);
    records.into_iter().filter(|r| r.timestamp >= cutoff).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    fn ts(s: &str) -> chrono::NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn loads_raw_export_schema() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "time,tmax,tavg,tmin,prcp").unwrap();
        writeln!(file, "01-06-2022,39.0,30.0,26.0,0.0").unwrap();
        writeln!(file, "02-06-2022,37.5,29.0,25.5,1.2").unwrap();
        file.flush().unwrap();

        let records = load_weather_csv(file.path(), (12.9716, 77.5946)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp, ts("2022-06-01"));
        assert_eq!(records[0].temp, 39.0);
        assert_eq!(records[0].lat, 12.9716); // pinned to default location
        assert_eq!(records[1].prcp, 1.2);
    }

    #[test]
    fn malformed_date_fails_fast() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "time,tmax,tavg,tmin,prcp").unwrap();
        writeln!(file, "June 1st,39.0,30.0,26.0,0.0").unwrap();
        file.flush().unwrap();

        let err = load_weather_csv(file.path(), (0.0, 0.0)).unwrap_err();
        assert!(format!("{err:#}").contains("malformed weather timestamp"));
    }

    #[test]
    fn trailing_filter_measures_from_max() {
        let base = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let records: Vec<_> = (0..400)
            .map(|d| WeatherRecord {
                timestamp: (base + Duration::days(d)).and_hms_opt(0, 0, 0).unwrap(),
                lat: 0.0,
                lon: 0.0,
                temp: 30.0,
                tavg: 25.0,
                tmin: 20.0,
                prcp: 0.0,
            })
            .collect();
        let kept = filter_trailing_days(records, 365);
        assert_eq!(kept.len(), 366); // inclusive cutoff
    }
}
